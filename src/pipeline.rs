//! One complete run: align, export the diff, classify failures, and
//! optionally compute the range-selected statistics.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::align::IdResolver;
use crate::color::subset_colors;
use crate::config::{ComputeLevel, RunConfig};
use crate::data::loader::{load_computed, load_diff, load_reference, load_snr};
use crate::data::model::DiffRow;
use crate::diff::{align_records, partition, visible_subsets, Subset};
use crate::error::{reject_directory, validate_input, InputRole};
use crate::export::{self, Figure, Series, SeriesSink};
use crate::failures::{failing_reference_rows, FailureClassifier};
use crate::stats::{compute_stats, cumulative_histogram, curve_edges, StatsReport};

pub const DIFF_FILE: &str = "diff.txt";
pub const FAILURES_FILE: &str = "failures.txt";
pub const FAILURES_SPECTRUM_LIST: &str = "failures.spectrumlist";
pub const FAILURES_REF_FILE: &str = "failures_ref.txt";

/// Counts describing a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub reference_rows: usize,
    pub matched: usize,
    pub missing: Vec<String>,
    pub ambiguous: usize,
    /// `None` when no SNR table was found.
    pub snr_matched: Option<usize>,
    pub failures: usize,
    pub failing_reference_rows: usize,
    pub stats_rows: Option<usize>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "run: {} reference rows, {} matched, {} missing, {} ambiguous, {} failures",
            self.reference_rows,
            self.matched,
            self.missing.len(),
            self.ambiguous,
            self.failures
        );
        if !self.missing.is_empty() {
            warn!("unmatched reference ids: {}", self.missing.join(", "));
        }
    }
}

/// Run the diff, failure and (for [`ComputeLevel::Full`]) statistics stages.
pub fn run(config: &RunConfig, sink: &mut dyn SeriesSink) -> Result<RunSummary> {
    validate_input(&config.reference, InputRole::Reference)?;
    validate_input(&config.computed, InputRole::Computed)?;
    if let Some(snr) = &config.snr {
        reject_directory(snr, InputRole::Snr)?;
    }

    let out_dir = config.output_path();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    // ---- Load ----
    let reference = load_reference(&config.reference, config.ref_type)?;
    let computed = load_computed(&config.computed)?;
    let snr_path = config.snr_path();
    let snr = if snr_path.is_file() {
        match load_snr(&snr_path) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("{e:#}; SNR left empty");
                None
            }
        }
    } else {
        info!("no SNR file at {}, SNR left empty", snr_path.display());
        None
    };

    // ---- Align ----
    let computed_resolver = IdResolver::containment(config.id_decorations.clone());
    let snr_resolver = IdResolver::containment(config.snr_decorations.clone());
    let aligned = align_records(
        &reference,
        &computed,
        snr.as_deref(),
        &computed_resolver,
        &snr_resolver,
    );
    aligned.computed_report.log_summary();
    if let Some(report) = &aligned.snr_report {
        report.log_summary();
    }

    let diff_path = out_dir.join(DIFF_FILE);
    export::write_diff(&diff_path, &aligned.rows())?;

    // ---- Failures, computed from the written diff ----
    let table = load_diff(&diff_path)?;
    let classifier = FailureClassifier::new(
        config.failure_threshold,
        &config.spectrum_extension,
        config.noise_rules.clone(),
    );
    let failures = classifier.classify(&table.rows);
    info!(
        "{} failures above |dz/(1+z)| > {}",
        failures.len(),
        classifier.threshold()
    );
    export::write_failures(&out_dir.join(FAILURES_FILE), table.header.as_deref(), &failures)?;
    export::write_spectrum_list(&out_dir.join(FAILURES_SPECTRUM_LIST), &failures)?;
    let failing_refs = failing_reference_rows(&reference, &failures, &computed_resolver);
    export::write_reference_subset(&out_dir.join(FAILURES_REF_FILE), &failing_refs)?;

    // ---- Figures ----
    let subsets = partition(&table.rows, config.subset_key);
    info!(
        "{} {:?} subsets: {}",
        subsets.len(),
        config.subset_key,
        subsets
            .iter()
            .map(|s| format!("{} (n={})", s.label, s.count()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let shown = visible_subsets(&subsets, config.subset_cap);
    emit_diff_figures(sink, &table.rows, shown)?;

    // ---- Statistics ----
    let stats_rows = match config.compute_level {
        ComputeLevel::Brief => None,
        ComputeLevel::Full => {
            let report = compute_stats(
                &table.rows,
                &config.selection,
                config.percentile_depth,
                config.failure_threshold,
            );
            let stats_dir = out_dir.join(config.selection.dir_name());
            write_stats(&stats_dir, &table.rows, &report)?;
            emit_stats_figures(sink, &table.rows, &report, shown)?;
            Some(report.rows.len())
        }
    };

    let report = &aligned.computed_report;
    Ok(RunSummary {
        reference_rows: reference.len(),
        matched: report.matched(),
        missing: report.misses.clone(),
        ambiguous: report.ambiguous.len(),
        snr_matched: aligned.snr_report.as_ref().map(|r| r.matched()),
        failures: failures.len(),
        failing_reference_rows: failing_refs.len(),
        stats_rows,
    })
}

/// Reload the diff export of a finished run and keep the rows whose absolute
/// normalized error exceeds `threshold` (every row when it is negative).
pub fn rows_above(out_dir: &Path, threshold: f64) -> Result<Vec<DiffRow>> {
    let table = load_diff(&out_dir.join(DIFF_FILE))?;
    Ok(table.above_threshold(threshold).into_iter().cloned().collect())
}

/// Write every statistics export of `report` into `dir`.
pub fn write_stats(dir: &Path, rows: &[DiffRow], report: &StatsReport) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating stats directory {}", dir.display()))?;
    export::write_subset_list(&dir.join("stats_subset_list.txt"), rows, report)?;
    export::write_histogram(&dir.join("stats_brief.txt"), &report.brief)?;
    export::write_histogram(&dir.join("stats.txt"), &report.fine)?;
    for cov in &report.covariates {
        let path = dir.join(format!("{}.txt", cov.covariate.file_stem()));
        export::write_covariate_histogram(&path, cov)?;
    }
    for zoom in &report.zoom {
        info!(
            "{}/{} spectra outside +/-{}",
            zoom.outside,
            report.rows.len(),
            zoom.range
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Figure series
// ---------------------------------------------------------------------------

const ERROR_LABEL: &str = "(zcalc-zref)/(1+zref)";

fn error_scatter(rows: &[DiffRow], subsets: &[Subset]) -> Vec<Series> {
    subsets
        .iter()
        .zip(subset_colors(subsets))
        .map(|(subset, (name, color))| {
            let (x, y): (Vec<f64>, Vec<f64>) = subset
                .indices
                .iter()
                .filter_map(|&i| rows[i].normalized_error().map(|e| (rows[i].ref_redshift, e)))
                .unzip();
            Series {
                name,
                color: Some(color),
                x,
                y,
            }
        })
        .collect()
}

fn emit_diff_figures(sink: &mut dyn SeriesSink, rows: &[DiffRow], shown: &[Subset]) -> Result<()> {
    let series = error_scatter(rows, shown);
    let figure = Figure {
        title: "Redshift error by subset".to_string(),
        x_label: "z reference".to_string(),
        y_label: ERROR_LABEL.to_string(),
        log_x: false,
        y_range: None,
        series,
    };
    sink.figure(
        "diff_yzoomed",
        Figure {
            y_range: Some((-0.005, 0.005)),
            ..figure.clone()
        },
    )?;
    sink.figure("diff", figure)
}

fn emit_stats_figures(
    sink: &mut dyn SeriesSink,
    rows: &[DiffRow],
    report: &StatsReport,
    shown: &[Subset],
) -> Result<()> {
    let zrefs: Vec<f64> = report.rows.iter().map(|&i| rows[i].ref_redshift).collect();
    let scatter = Figure {
        title: "All spectra included".to_string(),
        x_label: "z reference".to_string(),
        y_label: ERROR_LABEL.to_string(),
        log_x: false,
        y_range: None,
        series: vec![Series {
            name: "selected".to_string(),
            color: None,
            x: zrefs,
            y: report.errors.clone(),
        }],
    };
    for (k, zoom) in report.zoom.iter().enumerate() {
        let noun = if zoom.outside > 1 { "spectra" } else { "spectrum" };
        sink.figure(
            &format!("filteredset_relzerr_zoom_{}", k + 1),
            Figure {
                title: format!(
                    "{}/{} {noun} outside displayed range",
                    zoom.outside,
                    report.rows.len()
                ),
                y_range: Some((-zoom.range, zoom.range)),
                ..scatter.clone()
            },
        )?;
    }
    sink.figure("filteredset_relzerr", scatter)?;

    sink.figure(
        "stats_hist",
        Figure {
            title: format!("Success rate over {} spectra", report.curve.count),
            x_label: "abs( (zcalc-zref)/(1+zref) )".to_string(),
            y_label: "Success Rate (percentage)".to_string(),
            log_x: true,
            y_range: Some((0.0, 100.0)),
            series: vec![Series {
                name: "all".to_string(),
                color: None,
                x: report.curve.edges(),
                y: report.curve.percents(),
            }],
        },
    )?;

    // Per-subset curves restricted to the selected rows.
    let edges = curve_edges();
    let subset_series = shown
        .iter()
        .zip(subset_colors(shown))
        .map(|(subset, (label, color))| {
            let errors: Vec<f64> = report
                .rows
                .iter()
                .zip(&report.abs_errors)
                .filter(|(i, _)| subset.indices.binary_search(*i).is_ok())
                .map(|(_, &e)| e)
                .collect();
            let hist = cumulative_histogram(&errors, &edges);
            Series {
                name: format!("{label} (n={})", hist.count),
                color: Some(color),
                x: hist.edges(),
                y: hist.percents(),
            }
        })
        .collect();
    sink.figure(
        "stats_hist_subsets",
        Figure {
            title: "Success rate by subset".to_string(),
            x_label: "abs(diff)".to_string(),
            y_label: "Cumulative Histogram".to_string(),
            log_x: true,
            y_range: Some((0.0, 100.0)),
            series: subset_series,
        },
    )?;

    for cov in &report.covariates {
        let (x, y): (Vec<f64>, Vec<f64>) = cov
            .groups
            .iter()
            .filter(|g| g.count > 0)
            .map(|g| (0.5 * (g.lower + g.upper), g.success_rate))
            .unzip();
        sink.figure(
            cov.covariate.file_stem(),
            Figure {
                title: format!(
                    "Success rate vs {} ({} without value)",
                    cov.covariate.label(),
                    cov.excluded
                ),
                x_label: cov.covariate.label().to_string(),
                y_label: "Success Rate (percentage)".to_string(),
                log_x: false,
                y_range: Some((0.0, 100.0)),
                series: vec![Series {
                    name: cov.covariate.label().to_string(),
                    color: None,
                    x,
                    y,
                }],
            },
        )?;
    }
    Ok(())
}
