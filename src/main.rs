use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use redshift_diff::config::{ComputeLevel, RunConfig};
use redshift_diff::data::model::RefFileType;
use redshift_diff::diff::SubsetKey;
use redshift_diff::export::JsonSeriesSink;
use redshift_diff::pipeline;

/// Compare computed redshifts against a reference catalog.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON run configuration; command line options override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference redshift catalog.
    #[arg(short, long = "ref")]
    reference: Option<PathBuf>,

    /// Computed redshifts (pipeline output).
    #[arg(short, long = "calc")]
    computed: Option<PathBuf>,

    /// Reference file layout: vvds, vvds2, pfs or muse.
    #[arg(short = 't', long = "type")]
    ref_type: Option<RefFileType>,

    /// SNR table (default: snr2_TF_ErrF.csv beside the reference file).
    #[arg(long)]
    snr: Option<PathBuf>,

    /// Output directory (default: stats/ beside the computed file).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How much of the run to perform.
    #[arg(short = 'l', long = "computeLvl", value_enum)]
    compute_level: Option<ComputeLevel>,

    /// Magnitude window for the statistics, "min max".
    #[arg(short, long = "magRange", value_parser = parse_range)]
    mag_range: Option<(f64, f64)>,

    /// Reference redshift window for the statistics, "min max".
    #[arg(short, long = "zRange", value_parser = parse_range, allow_hyphen_values = true)]
    z_range: Option<(f64, f64)>,

    /// Failure threshold on |dz / (1 + z)|.
    #[arg(long)]
    threshold: Option<f64>,

    /// Column the figures are split by.
    #[arg(long, value_enum)]
    subset: Option<SubsetKey>,

    /// After the run, print the diff rows whose |dz / (1 + z)| exceeds this
    /// value (negative: every row).
    #[arg(long = "list-above", allow_negative_numbers = true)]
    list_above: Option<f64>,
}

fn parse_range(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts.as_slice() {
        [lo, hi] => {
            let lo = lo.parse::<f64>().map_err(|e| format!("'{lo}': {e}"))?;
            let hi = hi.parse::<f64>().map_err(|e| format!("'{hi}': {e}"))?;
            Ok((lo, hi))
        }
        _ => Err(format!("expected \"min max\", got '{s}'")),
    }
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.reference {
            cfg.reference = v;
        }
        if let Some(v) = self.computed {
            cfg.computed = v;
        }
        if let Some(v) = self.ref_type {
            cfg.ref_type = v;
        }
        if self.snr.is_some() {
            cfg.snr = self.snr;
        }
        if self.output.is_some() {
            cfg.output_dir = self.output;
        }
        if let Some(v) = self.compute_level {
            cfg.compute_level = v;
        }
        if let Some(v) = self.mag_range {
            cfg.selection.mag_range = v;
        }
        if let Some(v) = self.z_range {
            cfg.selection.z_range = v;
        }
        if let Some(v) = self.threshold {
            cfg.failure_threshold = v;
        }
        if let Some(v) = self.subset {
            cfg.subset_key = v;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let list_above = cli.list_above;
    let cfg = cli.into_config()?;
    info!(
        "reference {} ({} layout), computed {}",
        cfg.reference.display(),
        cfg.ref_type,
        cfg.computed.display()
    );

    let mut sink = JsonSeriesSink::new(cfg.output_path().join("series.json"));
    let summary = pipeline::run(&cfg, &mut sink)?;
    sink.finish()?;
    summary.log();

    if let Some(threshold) = list_above {
        for row in pipeline::rows_above(&cfg.output_path(), threshold)? {
            let err = row.normalized_error().map_or_else(|| "-1".to_string(), |e| e.to_string());
            println!("{}\t{}\t{}", row.id, row.ref_redshift, err);
        }
    }
    Ok(())
}
