use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::data::filter::RangeSelection;
use crate::data::model::RefFileType;
use crate::diff::SubsetKey;
use crate::failures::{default_noise_rules, NoiseRule, DEFAULT_FAILURE_THRESHOLD};

/// File name of the SNR table looked up beside the reference file.
pub const DEFAULT_SNR_FILE: &str = "snr2_TF_ErrF.csv";

/// How much of the run to perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComputeLevel {
    /// Diff and failure exports only.
    #[default]
    Brief,
    /// Additionally the range-selected success-rate statistics.
    Full,
}

/// Filename decorations the pipeline adds around reference ids.
pub fn default_id_decorations() -> Vec<String> {
    [
        "FILTERED_SET_reallyjustlinecont_1k_0.5z1.8_0.1A100_Version",
        "FILTERED_FEB2015_1stapprox_SET_reallyjustlinecont_1k_0.5z1.8_0.1A100_Version",
        "FILTERED_SEPT2015_1loopw100_SET_reallyjustlinecont_1k_0.5z1.8_0.1A100_Version",
        "FILTERED_SEPT2015_2loopw50_SET_reallyjustlinecont_1k_0.5z1.8_0.1A100_Version",
        "470026900000130.2-0.4_20_20.5_EZ_fits-W-TF",
        "470026900000130.2-0.4_20_20.5_EZ_fits-W-F",
        "SPC_fits-W-F_",
        "SPC_fits-W-TF_",
        "SPC_fits-W-FILT_",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_snr_decorations() -> Vec<String> {
    vec!["SPC_fits-W-TF_".to_string(), ".fits".to_string()]
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Everything a diff/stats run needs. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub reference: PathBuf,
    pub computed: PathBuf,
    /// Defaults to [`DEFAULT_SNR_FILE`] beside the reference file.
    pub snr: Option<PathBuf>,
    /// Defaults to `stats/` beside the computed file.
    pub output_dir: Option<PathBuf>,
    pub ref_type: RefFileType,
    pub failure_threshold: f64,
    pub subset_key: SubsetKey,
    pub subset_cap: usize,
    pub compute_level: ComputeLevel,
    pub selection: RangeSelection,
    pub percentile_depth: u32,
    pub id_decorations: Vec<String>,
    pub snr_decorations: Vec<String>,
    pub noise_rules: Vec<NoiseRule>,
    pub spectrum_extension: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            reference: PathBuf::from("referenceRedshifts.txt"),
            computed: PathBuf::from("output.txt"),
            snr: None,
            output_dir: None,
            ref_type: RefFileType::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            subset_key: SubsetKey::default(),
            subset_cap: 12,
            compute_level: ComputeLevel::default(),
            selection: RangeSelection::default(),
            percentile_depth: 1,
            id_decorations: default_id_decorations(),
            snr_decorations: default_snr_decorations(),
            noise_rules: default_noise_rules(),
            spectrum_extension: ".fits".to_string(),
        }
    }
}

impl RunConfig {
    /// Read a JSON configuration; missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn snr_path(&self) -> PathBuf {
        self.snr.clone().unwrap_or_else(|| {
            parent_dir(&self.reference).join(DEFAULT_SNR_FILE)
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| parent_dir(&self.computed).join("stats"))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_level_names() {
        assert_eq!(ComputeLevel::from_str("full", true).unwrap(), ComputeLevel::Full);
        assert!(ComputeLevel::from_str("everything", true).is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{ "reference": "cat/ref.txt", "ref_type": "pfs", "failure_threshold": 0.02 }"#,
        )
        .unwrap();
        assert_eq!(cfg.ref_type, RefFileType::Pfs);
        assert_eq!(cfg.failure_threshold, 0.02);
        assert_eq!(cfg.subset_cap, 12);
        assert_eq!(cfg.snr_path(), PathBuf::from("cat").join(DEFAULT_SNR_FILE));
    }

    #[test]
    fn output_dir_defaults_beside_computed() {
        let cfg = RunConfig {
            computed: PathBuf::from("run/redshift.csv"),
            ..Default::default()
        };
        assert_eq!(cfg.output_path(), PathBuf::from("run").join("stats"));
    }
}
