//! Catastrophic-failure selection and the inputs needed to reprocess only the
//! failing spectra.

use log::Level;
use serde::{Deserialize, Serialize};

use crate::align::{IdMatcher, IdResolver};
use crate::data::model::{DiffRow, ReferenceRecord};

pub const DEFAULT_FAILURE_THRESHOLD: f64 = 0.01;

// ---------------------------------------------------------------------------
// Noise spectrum naming
// ---------------------------------------------------------------------------

/// Replace `pattern` with `replacement` to go from a signal spectrum file
/// name to its noise spectrum file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseRule {
    pub pattern: String,
    pub replacement: String,
}

impl NoiseRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Known naming conventions, highest priority first.
pub fn default_noise_rules() -> Vec<NoiseRule> {
    vec![
        NoiseRule::new("_atm_clean", "_noise"),
        NoiseRule::new("-W-F_", "-W-ErrF_"),
    ]
}

/// Derive the noise file name using the first rule whose pattern occurs in
/// `spectrum`. Without a matching rule the name is returned unchanged.
pub fn noise_name(spectrum: &str, rules: &[NoiseRule]) -> String {
    rules
        .iter()
        .find(|r| !r.pattern.is_empty() && spectrum.contains(r.pattern.as_str()))
        .map(|r| spectrum.replace(r.pattern.as_str(), &r.replacement))
        .unwrap_or_else(|| spectrum.to_string())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A failing row with the spectrum/noise file pair to reprocess it.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub row: DiffRow,
    pub spectrum: String,
    pub noise: String,
}

#[derive(Debug, Clone)]
pub struct FailureClassifier {
    threshold: f64,
    spectrum_extension: String,
    noise_rules: Vec<NoiseRule>,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, ".fits", default_noise_rules())
    }
}

impl FailureClassifier {
    pub fn new(threshold: f64, spectrum_extension: &str, noise_rules: Vec<NoiseRule>) -> Self {
        Self {
            threshold,
            spectrum_extension: spectrum_extension.to_string(),
            noise_rules,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Strictly above the threshold; an error equal to it passes.
    pub fn is_failure(&self, row: &DiffRow) -> bool {
        row.normalized_error()
            .is_some_and(|e| e.abs() > self.threshold)
    }

    pub fn classify(&self, rows: &[DiffRow]) -> Vec<FailureRecord> {
        rows.iter()
            .filter(|row| self.is_failure(row))
            .map(|row| {
                let spectrum = format!("{}{}", row.id, self.spectrum_extension);
                let noise = noise_name(&spectrum, &self.noise_rules);
                FailureRecord {
                    row: row.clone(),
                    spectrum,
                    noise,
                }
            })
            .collect()
    }
}

/// Reference rows whose id resolves against the failing spectrum names, in
/// reference order. Non-failing objects are expected misses and are only
/// logged at debug level.
pub fn failing_reference_rows<'a, M: IdMatcher + Clone>(
    reference: &'a [ReferenceRecord],
    failures: &[FailureRecord],
    resolver: &IdResolver<M>,
) -> Vec<&'a ReferenceRecord> {
    let ref_ids: Vec<&str> = reference.iter().map(|r| r.id.as_str()).collect();
    let names: Vec<&str> = failures.iter().map(|f| f.spectrum.as_str()).collect();
    let alignment = resolver
        .clone()
        .with_miss_level(Level::Debug)
        .resolve("failures", &ref_ids, &names);

    reference
        .iter()
        .zip(alignment.indices)
        .filter_map(|(r, idx)| idx.map(|_| r))
        .collect()
}
