//! Tab-separated exports and the series handed to figure rendering.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::model::{DiffRow, ReferenceRecord, DIFF_HEADER, SENTINEL};
use crate::failures::FailureRecord;
use crate::stats::{CovariateHistogram, CumulativeHistogram, StatsReport, BRIEF_EDGES};

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))
}

fn diff_header() -> Vec<String> {
    DIFF_HEADER
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { format!("#{h}") } else { h.to_string() })
        .collect()
}

// ---------------------------------------------------------------------------
// Diff and failure exports
// ---------------------------------------------------------------------------

/// Write the unified 13-column diff export.
pub fn write_diff(path: &Path, rows: &[DiffRow]) -> Result<()> {
    let mut w = tsv_writer(path)?;
    w.write_record(diff_header())?;
    for row in rows {
        w.write_record(row.to_fields())?;
    }
    w.flush()?;
    Ok(())
}

/// Write failing rows under `header` (the diff file's header line when it
/// was reloaded, the canonical header otherwise).
pub fn write_failures(path: &Path, header: Option<&str>, failures: &[FailureRecord]) -> Result<()> {
    let mut w = tsv_writer(path)?;
    match header {
        Some(h) => w.write_record(h.trim_end().split('\t'))?,
        None => w.write_record(diff_header())?,
    }
    for f in failures {
        w.write_record(f.row.to_fields())?;
    }
    w.flush()?;
    Ok(())
}

/// Signal/noise file pairs, usable as a spectrum list for reprocessing.
pub fn write_spectrum_list(path: &Path, failures: &[FailureRecord]) -> Result<()> {
    let mut w = tsv_writer(path)?;
    for f in failures {
        w.write_record([f.spectrum.as_str(), f.noise.as_str()])?;
    }
    w.flush()?;
    Ok(())
}

/// Reference rows as read, for comparing a reprocessed subset.
pub fn write_reference_subset(path: &Path, rows: &[&ReferenceRecord]) -> Result<()> {
    let mut w = tsv_writer(path)?;
    for r in rows {
        w.write_record(&r.raw)?;
    }
    w.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Statistics exports
// ---------------------------------------------------------------------------

/// `index  edge  percent` rows.
pub fn write_histogram(path: &Path, hist: &CumulativeHistogram) -> Result<()> {
    let mut w = tsv_writer(path)?;
    for (i, b) in hist.bins.iter().enumerate() {
        w.write_record([i.to_string(), b.edge.to_string(), b.percent.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

/// The rows that entered the statistics, with their absolute error.
pub fn write_subset_list(path: &Path, rows: &[DiffRow], report: &StatsReport) -> Result<()> {
    let mut w = tsv_writer(path)?;
    w.write_record(["ID", "ZCALC", "DIFF", "MAG", "SNR", "SFR", "EBmV", "Sigma", "ZREF"])?;
    let opt = |v: Option<f64>| v.unwrap_or(SENTINEL).to_string();
    for (&i, &err) in report.rows.iter().zip(&report.abs_errors) {
        let r = &rows[i];
        w.write_record([
            r.id.clone(),
            opt(r.calc_redshift),
            err.to_string(),
            r.magnitude.to_string(),
            opt(r.snr),
            opt(r.sfr),
            opt(r.ebmv),
            opt(r.sigma),
            r.ref_redshift.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// One row per covariate group: bounds, count, success rate, then the
/// cumulative percentage at each brief edge.
pub fn write_covariate_histogram(path: &Path, hist: &CovariateHistogram) -> Result<()> {
    let mut w = tsv_writer(path)?;
    let mut header = vec![
        "#INDEX".to_string(),
        format!("{}MIN", hist.covariate.label()),
        format!("{}MAX", hist.covariate.label()),
        "COUNT".to_string(),
        "SUCCESS".to_string(),
    ];
    header.extend(BRIEF_EDGES.iter().map(|e| e.to_string()));
    w.write_record(&header)?;

    for (k, g) in hist.groups.iter().enumerate() {
        let mut rec = vec![
            k.to_string(),
            g.lower.to_string(),
            g.upper.to_string(),
            g.count.to_string(),
            g.success_rate.to_string(),
        ];
        rec.extend(g.histogram.percents().iter().map(|p| p.to_string()));
        w.write_record(&rec)?;
    }
    w.write_record(["#EXCLUDED".to_string(), hist.excluded.to_string()])?;
    w.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Series for figure rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub log_x: bool,
    pub y_range: Option<(f64, f64)>,
    pub series: Vec<Series>,
}

/// Receives the numeric series of each figure. Rendering is up to the
/// implementor.
pub trait SeriesSink {
    fn figure(&mut self, name: &str, figure: Figure) -> Result<()>;
}

/// Collects figures and writes them as one JSON document.
#[derive(Debug)]
pub struct JsonSeriesSink {
    path: PathBuf,
    figures: BTreeMap<String, Figure>,
}

impl JsonSeriesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            figures: BTreeMap::new(),
        }
    }

    pub fn figures(&self) -> &BTreeMap<String, Figure> {
        &self.figures
    }

    pub fn finish(self) -> Result<()> {
        let file = std::fs::File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        serde_json::to_writer_pretty(file, &self.figures)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

impl SeriesSink for JsonSeriesSink {
    fn figure(&mut self, name: &str, figure: Figure) -> Result<()> {
        self.figures.insert(name.to_string(), figure);
        Ok(())
    }
}
