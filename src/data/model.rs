use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value written in place of an absent optional field.
pub const SENTINEL: f64 = -1.0;

/// Map the legacy `-1` "no value" marker to `None`.
pub fn non_sentinel(v: f64) -> Option<f64> {
    if v == SENTINEL {
        None
    } else {
        Some(v)
    }
}

// ---------------------------------------------------------------------------
// RefFileType – column layout of a reference catalog
// ---------------------------------------------------------------------------

/// Named reference catalog layouts. The object id is always column 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefFileType {
    #[default]
    #[serde(alias = "vvds1")]
    Vvds,
    Vvds2,
    Pfs,
    Muse,
}

/// Column indices selected by a [`RefFileType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefColumns {
    pub redshift: usize,
    pub magnitude: usize,
    pub flag: Option<usize>,
    pub sfr: Option<usize>,
    pub ebmv: Option<usize>,
    pub sigma: Option<usize>,
}

impl RefColumns {
    /// Smallest row width that carries every mapped column.
    pub fn min_width(&self) -> usize {
        [
            Some(self.redshift),
            Some(self.magnitude),
            self.flag,
            self.sfr,
            self.ebmv,
            self.sigma,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
            + 1
    }
}

impl RefFileType {
    pub fn columns(self) -> RefColumns {
        match self {
            RefFileType::Vvds => RefColumns {
                redshift: 4,
                magnitude: 6,
                flag: Some(5),
                sfr: None,
                ebmv: None,
                sigma: None,
            },
            RefFileType::Vvds2 => RefColumns {
                redshift: 5,
                magnitude: 4,
                flag: Some(6),
                sfr: None,
                ebmv: None,
                sigma: None,
            },
            RefFileType::Pfs => RefColumns {
                redshift: 1,
                magnitude: 2,
                flag: None,
                sfr: Some(5),
                ebmv: Some(4),
                sigma: Some(6),
            },
            // MUSE catalogs carry no magnitude; the redshift column stands in.
            RefFileType::Muse => RefColumns {
                redshift: 1,
                magnitude: 1,
                flag: None,
                sfr: None,
                ebmv: None,
                sigma: None,
            },
        }
    }
}

impl fmt::Display for RefFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefFileType::Vvds => "vvds",
            RefFileType::Vvds2 => "vvds2",
            RefFileType::Pfs => "pfs",
            RefFileType::Muse => "muse",
        };
        f.write_str(name)
    }
}

impl FromStr for RefFileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vvds" | "vvds1" => Ok(RefFileType::Vvds),
            "vvds2" => Ok(RefFileType::Vvds2),
            "pfs" => Ok(RefFileType::Pfs),
            "muse" => Ok(RefFileType::Muse),
            other => Err(format!(
                "unknown reference file type '{other}' (expected vvds, vvds2, pfs or muse)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// One row of the trusted reference catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub id: String,
    pub redshift: f64,
    pub magnitude: f64,
    pub flag: Option<i64>,
    pub sfr: Option<f64>,
    pub ebmv: Option<f64>,
    pub sigma: Option<f64>,
    /// Row tokens as read, re-emitted for the failure reference subset.
    pub raw: Vec<String>,
}

impl ReferenceRecord {
    /// Whether `redshift` is a usable value rather than the "no value" marker.
    pub fn has_redshift(&self) -> bool {
        valid_redshift(self.redshift)
    }
}

/// A redshift of `-1` (or anything making `1 + z` non-positive) carries no
/// measurement and must not feed a `(1 + z)` normalization.
pub fn valid_redshift(z: f64) -> bool {
    z.is_finite() && z != SENTINEL && 1.0 + z > 0.0
}

/// One row of the pipeline output.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRecord {
    pub id: String,
    pub redshift: f64,
    pub merit: f64,
    pub method: String,
    pub template: Option<String>,
}

/// One row of the optional signal-to-noise table.
#[derive(Debug, Clone, PartialEq)]
pub struct SnrRecord {
    pub id: String,
    pub snr: f64,
}

// ---------------------------------------------------------------------------
// DiffRow – one line of the unified diff export
// ---------------------------------------------------------------------------

/// Column names of the unified diff export, in order.
pub const DIFF_HEADER: [&str; 13] = [
    "ID", "MAGI", "ZREF", "ZFLAG", "ZCALC", "MERIT", "TPL", "METHOD", "SNR", "SFR", "E(B-V)",
    "Sigma", "DIFF",
];

/// The flat, serializable view of an aligned record.
///
/// `calc_redshift == None` marks a reference object the pipeline produced no
/// result for.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub id: String,
    pub magnitude: f64,
    pub ref_redshift: f64,
    pub flag: Option<i64>,
    pub calc_redshift: Option<f64>,
    pub merit: Option<f64>,
    pub template: Option<String>,
    pub method: Option<String>,
    pub snr: Option<f64>,
    pub sfr: Option<f64>,
    pub ebmv: Option<f64>,
    pub sigma: Option<f64>,
    /// `calc_redshift - ref_redshift`.
    pub diff: Option<f64>,
}

impl DiffRow {
    pub fn is_matched(&self) -> bool {
        self.calc_redshift.is_some()
    }

    /// `diff / (1 + zref)`, absent when unmatched or when the reference
    /// redshift is the "no value" marker.
    pub fn normalized_error(&self) -> Option<f64> {
        let diff = self.diff?;
        if !valid_redshift(self.ref_redshift) {
            return None;
        }
        Some(diff / (1.0 + self.ref_redshift))
    }

    /// Render the row as the 13 export fields, absent values as `-1`.
    pub fn to_fields(&self) -> Vec<String> {
        fn num(v: Option<f64>) -> String {
            v.unwrap_or(SENTINEL).to_string()
        }
        fn text(v: &Option<String>) -> String {
            v.clone().unwrap_or_else(|| "-1".to_string())
        }
        vec![
            self.id.clone(),
            self.magnitude.to_string(),
            self.ref_redshift.to_string(),
            self.flag.unwrap_or(-1).to_string(),
            num(self.calc_redshift),
            num(self.merit),
            text(&self.template),
            text(&self.method),
            num(self.snr),
            num(self.sfr),
            num(self.ebmv),
            num(self.sigma),
            num(self.diff),
        ]
    }
}

// ---------------------------------------------------------------------------
// DiffTable – a reloaded diff export
// ---------------------------------------------------------------------------

/// Rows of a diff export plus the header line they were written with.
#[derive(Debug, Clone, Default)]
pub struct DiffTable {
    pub header: Option<String>,
    pub rows: Vec<DiffRow>,
}

impl DiffTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose absolute normalized error exceeds `threshold`.
    /// A negative threshold disables filtering and returns every row.
    pub fn above_threshold(&self, threshold: f64) -> Vec<&DiffRow> {
        if threshold < 0.0 {
            return self.rows.iter().collect();
        }
        self.rows
            .iter()
            .filter(|r| r.normalized_error().is_some_and(|e| e.abs() > threshold))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_type_parses_legacy_names() {
        assert_eq!("vvds1".parse::<RefFileType>().unwrap(), RefFileType::Vvds);
        assert_eq!("PFS".parse::<RefFileType>().unwrap(), RefFileType::Pfs);
        assert!("sdss".parse::<RefFileType>().is_err());
    }

    #[test]
    fn min_width_covers_highest_column() {
        assert_eq!(RefFileType::Vvds.columns().min_width(), 7);
        assert_eq!(RefFileType::Muse.columns().min_width(), 2);
    }

    #[test]
    fn sentinel_redshift_has_no_normalized_error() {
        let row = DiffRow {
            id: "x".into(),
            magnitude: 22.0,
            ref_redshift: -1.0,
            flag: None,
            calc_redshift: Some(0.5),
            merit: Some(1.0),
            template: None,
            method: Some("m".into()),
            snr: None,
            sfr: None,
            ebmv: None,
            sigma: None,
            diff: Some(1.5),
        };
        assert_eq!(row.normalized_error(), None);
        assert_eq!(row.to_fields()[3], "-1");
    }

    #[test]
    fn threshold_listing_skips_small_errors() {
        let row = |id: &str, zcalc: f64| DiffRow {
            id: id.into(),
            magnitude: 22.0,
            ref_redshift: 1.0,
            flag: None,
            calc_redshift: Some(zcalc),
            merit: Some(1.0),
            template: None,
            method: Some("m".into()),
            snr: None,
            sfr: None,
            ebmv: None,
            sigma: None,
            diff: Some(zcalc - 1.0),
        };
        let table = DiffTable {
            header: None,
            rows: vec![row("ok", 1.001), row("bad", 1.5)],
        };
        let ids: Vec<&str> = table.above_threshold(0.01).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["bad"]);
        assert_eq!(table.above_threshold(-1.0).len(), 2);
    }
}
