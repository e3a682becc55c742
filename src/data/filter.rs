use serde::{Deserialize, Serialize};

use super::model::DiffRow;

// ---------------------------------------------------------------------------
// Range selection applied before computing statistics
// ---------------------------------------------------------------------------

/// Inclusive reference-redshift and magnitude windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSelection {
    pub z_range: (f64, f64),
    pub mag_range: (f64, f64),
}

impl Default for RangeSelection {
    fn default() -> Self {
        Self {
            z_range: (-1.0, 20.0),
            mag_range: (0.0, 40.0),
        }
    }
}

impl RangeSelection {
    pub fn contains(&self, row: &DiffRow) -> bool {
        let (zmin, zmax) = self.z_range;
        let (magmin, magmax) = self.mag_range;
        row.ref_redshift >= zmin
            && row.ref_redshift <= zmax
            && row.magnitude >= magmin
            && row.magnitude <= magmax
    }

    /// Name of the directory the statistics for this selection are written to.
    pub fn dir_name(&self) -> String {
        format!(
            "stats_magmin{}magmax{}_zmin{}zmax{}",
            self.mag_range.0, self.mag_range.1, self.z_range.0, self.z_range.1
        )
    }
}

/// Return indices of rows inside both windows.
pub fn selected_indices(rows: &[DiffRow], selection: &RangeSelection) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| selection.contains(row))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(z: f64, mag: f64) -> DiffRow {
        DiffRow {
            id: "r".into(),
            magnitude: mag,
            ref_redshift: z,
            flag: None,
            calc_redshift: Some(z),
            merit: Some(0.0),
            template: None,
            method: None,
            snr: None,
            sfr: None,
            ebmv: None,
            sigma: None,
            diff: Some(0.0),
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let sel = RangeSelection {
            z_range: (0.5, 1.0),
            mag_range: (20.0, 23.0),
        };
        let rows = vec![row(0.5, 20.0), row(1.0, 23.0), row(1.01, 21.0), row(0.7, 23.5)];
        assert_eq!(selected_indices(&rows, &sel), vec![0, 1]);
    }

    #[test]
    fn dir_name_matches_legacy_layout() {
        assert_eq!(
            RangeSelection::default().dir_name(),
            "stats_magmin0magmax40_zmin-1zmax20"
        );
    }
}
