//! Success-rate statistics over normalized redshift errors.
//!
//! All histograms here are cumulative: the value at an edge is the percentage
//! of errors strictly below it.

use log::{debug, info};
use serde::Serialize;

use crate::data::filter::{selected_indices, RangeSelection};
use crate::data::model::{non_sentinel, valid_redshift, DiffRow};

/// Coarse edges of the brief success-rate table.
pub const BRIEF_EDGES: [f64; 9] = [1e-5, 1e-4, 5e-4, 1e-3, 5e-3, 1e-2, 0.1, 1.0, 10.0];

/// Half-widths of the zoomed error windows; rows outside are counted.
pub const ZOOM_RANGES: [f64; 2] = [0.005, 0.0005];

/// `n` edges evenly spaced in log10 between `10^start` and `10^end`, both
/// included.
pub fn logspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| 10f64.powf(start + step * i as f64)).collect()
        }
    }
}

/// 50 log-spaced edges from 1e-5 to 10.
pub fn fine_edges() -> Vec<f64> {
    logspace(-5.0, 1.0, 50)
}

/// 500 log-spaced edges from 1e-5 to 10, for plotted curves.
pub fn curve_edges() -> Vec<f64> {
    logspace(-5.0, 1.0, 500)
}

// ---------------------------------------------------------------------------
// Cumulative histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub edge: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CumulativeHistogram {
    /// Number of values the percentages are relative to.
    pub count: usize,
    pub bins: Vec<HistogramBin>,
}

impl CumulativeHistogram {
    pub fn edges(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.edge).collect()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.percent).collect()
    }
}

/// For each edge, the percentage of `values` strictly below it. An empty
/// series yields 0% everywhere.
pub fn cumulative_histogram(values: &[f64], edges: &[f64]) -> CumulativeHistogram {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    let bins = edges
        .iter()
        .map(|&edge| {
            let below = sorted.partition_point(|&v| v < edge);
            let percent = if n == 0 {
                0.0
            } else {
                below as f64 / n as f64 * 100.0
            };
            HistogramBin { edge, percent }
        })
        .collect();

    CumulativeHistogram { count: n, bins }
}

/// Percentage of `values` strictly below `edge`.
pub fn percent_below(values: &[f64], edge: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let below = values.iter().filter(|&&v| v < edge).count();
    below as f64 / values.len() as f64 * 100.0
}

// ---------------------------------------------------------------------------
// Covariate binning
// ---------------------------------------------------------------------------

/// Secondary quantity the success rate is studied against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Covariate {
    Magnitude,
    Snr,
    Redshift,
    Sfr,
    Ebmv,
    Sigma,
}

impl Covariate {
    pub const ALL: [Covariate; 6] = [
        Covariate::Magnitude,
        Covariate::Snr,
        Covariate::Redshift,
        Covariate::Sfr,
        Covariate::Ebmv,
        Covariate::Sigma,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Covariate::Magnitude => "MAG",
            Covariate::Snr => "SNR",
            Covariate::Redshift => "REDSHIFT",
            Covariate::Sfr => "SFR",
            Covariate::Ebmv => "EBMV",
            Covariate::Sigma => "SIGMA",
        }
    }

    /// Export file name without extension.
    pub fn file_stem(self) -> &'static str {
        match self {
            Covariate::Magnitude => "stats_versusMag_hist",
            Covariate::Snr => "stats_versusNoise_hist",
            Covariate::Redshift => "stats_versusRedshift_hist",
            Covariate::Sfr => "stats_versusSFR_hist",
            Covariate::Ebmv => "stats_versusEBMV_hist",
            Covariate::Sigma => "stats_versusSigma_hist",
        }
    }

    pub fn value(self, row: &DiffRow) -> Option<f64> {
        match self {
            Covariate::Magnitude => non_sentinel(row.magnitude),
            Covariate::Snr => row.snr,
            Covariate::Redshift => valid_redshift(row.ref_redshift).then_some(row.ref_redshift),
            Covariate::Sfr => row.sfr,
            Covariate::Ebmv => row.ebmv,
            Covariate::Sigma => row.sigma,
        }
    }
}

/// One covariate percentile bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovariateGroup {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// Percentage of the group's errors below the failure threshold.
    pub success_rate: f64,
    pub histogram: CumulativeHistogram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovariateHistogram {
    pub covariate: Covariate,
    pub groups: Vec<CovariateGroup>,
    /// Rows whose covariate value is absent.
    pub excluded: usize,
}

/// Number of covariate groups for a percentile depth: quartiles at depth 1,
/// each further level doubling the count.
pub fn group_count(depth: u32) -> usize {
    1usize << (depth.min(8) + 1)
}

/// Value at `fraction` (0..=1) of a sorted slice, nearest-lower rank.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * fraction) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Split `(error, covariate)` pairs into equal-count covariate groups and
/// compute the cumulative success curve of each. Pairs with an absent
/// covariate are counted in `excluded` and otherwise ignored.
pub fn covariate_histogram(
    covariate: Covariate,
    pairs: &[(f64, Option<f64>)],
    depth: u32,
    edges: &[f64],
    threshold: f64,
) -> CovariateHistogram {
    let valid: Vec<(f64, f64)> = pairs
        .iter()
        .filter_map(|&(err, cov)| cov.map(|c| (err, c)))
        .collect();
    let excluded = pairs.len() - valid.len();

    if valid.is_empty() {
        debug!("{}: no covariate values, nothing to bin", covariate.label());
        return CovariateHistogram {
            covariate,
            groups: Vec::new(),
            excluded,
        };
    }

    let mut sorted: Vec<f64> = valid.iter().map(|&(_, c)| c).collect();
    sorted.sort_by(f64::total_cmp);

    let n_groups = group_count(depth);
    let bounds: Vec<f64> = (0..=n_groups)
        .map(|k| percentile(&sorted, k as f64 / n_groups as f64))
        .collect();

    let groups = bounds
        .windows(2)
        .enumerate()
        .map(|(k, w)| {
            let (lower, upper) = (w[0], w[1]);
            let last = k == n_groups - 1;
            let errors: Vec<f64> = valid
                .iter()
                .filter(|&&(_, c)| c >= lower && (c < upper || (last && c <= upper)))
                .map(|&(e, _)| e)
                .collect();
            CovariateGroup {
                lower,
                upper,
                count: errors.len(),
                success_rate: percent_below(&errors, threshold),
                histogram: cumulative_histogram(&errors, edges),
            }
        })
        .collect();

    CovariateHistogram {
        covariate,
        groups,
        excluded,
    }
}

// ---------------------------------------------------------------------------
// Full statistics over a diff table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomWindow {
    pub range: f64,
    /// Selected rows with |normalized error| above `range`.
    pub outside: usize,
}

/// Everything the stats run exports for one range selection.
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub selection: RangeSelection,
    /// Indices into the diff table of the rows that entered the statistics.
    pub rows: Vec<usize>,
    /// Absolute normalized error of each row in `rows`.
    pub abs_errors: Vec<f64>,
    /// Signed normalized error of each row in `rows`.
    pub errors: Vec<f64>,
    /// Rows inside the windows but without a normalized error.
    pub without_error: usize,
    pub brief: CumulativeHistogram,
    pub fine: CumulativeHistogram,
    pub curve: CumulativeHistogram,
    pub zoom: Vec<ZoomWindow>,
    pub covariates: Vec<CovariateHistogram>,
}

pub fn compute_stats(
    rows: &[DiffRow],
    selection: &RangeSelection,
    depth: u32,
    threshold: f64,
) -> StatsReport {
    let in_range = selected_indices(rows, selection);
    let mut kept = Vec::with_capacity(in_range.len());
    let mut errors = Vec::with_capacity(in_range.len());
    for &i in &in_range {
        if let Some(e) = rows[i].normalized_error() {
            kept.push(i);
            errors.push(e);
        }
    }
    let without_error = in_range.len() - kept.len();
    let abs_errors: Vec<f64> = errors.iter().map(|e| e.abs()).collect();

    info!(
        "stats: {} of {} rows selected ({} without a normalized error)",
        kept.len(),
        rows.len(),
        without_error
    );

    let zoom = ZOOM_RANGES
        .iter()
        .map(|&range| ZoomWindow {
            range,
            outside: errors.iter().filter(|e| e.abs() > range).count(),
        })
        .collect();

    let covariates = Covariate::ALL
        .iter()
        .map(|&cov| {
            let pairs: Vec<(f64, Option<f64>)> = kept
                .iter()
                .zip(&abs_errors)
                .map(|(&i, &e)| (e, cov.value(&rows[i])))
                .collect();
            covariate_histogram(cov, &pairs, depth, &BRIEF_EDGES, threshold)
        })
        .collect();

    StatsReport {
        selection: *selection,
        brief: cumulative_histogram(&abs_errors, &BRIEF_EDGES),
        fine: cumulative_histogram(&abs_errors, &fine_edges()),
        curve: cumulative_histogram(&abs_errors, &curve_edges()),
        rows: kept,
        abs_errors,
        errors,
        without_error,
        zoom,
        covariates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logspace_spans_endpoints() {
        let edges = fine_edges();
        assert_eq!(edges.len(), 50);
        assert!((edges[0] - 1e-5).abs() < 1e-18);
        assert!((edges[49] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn cumulative_is_strictly_below() {
        let h = cumulative_histogram(&[0.001, 0.01, 0.5], &[0.001, 0.01, 1.0]);
        let p = h.percents();
        assert_eq!(p[0], 0.0);
        assert!((p[1] - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(p[2], 100.0);
    }

    #[test]
    fn empty_series_is_zero() {
        let h = cumulative_histogram(&[], &BRIEF_EDGES);
        assert!(h.percents().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn covariate_sentinels_are_excluded_but_counted() {
        let pairs = vec![
            (0.0001, Some(20.0)),
            (0.2, Some(21.0)),
            (0.0001, Some(22.0)),
            (0.0001, Some(23.0)),
            (0.5, None),
        ];
        let h = covariate_histogram(Covariate::Magnitude, &pairs, 1, &BRIEF_EDGES, 0.01);
        assert_eq!(h.excluded, 1);
        assert_eq!(h.groups.len(), 4);
        let total: usize = h.groups.iter().map(|g| g.count).sum();
        assert_eq!(total, 4);
        assert_eq!(h.groups[0].lower, 20.0);
        assert_eq!(h.groups[3].upper, 23.0);
    }

    #[test]
    fn group_count_follows_depth() {
        assert_eq!(group_count(0), 2);
        assert_eq!(group_count(1), 4);
        assert_eq!(group_count(2), 8);
    }
}
