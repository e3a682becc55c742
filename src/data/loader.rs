use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use super::model::{
    non_sentinel, ComputedRecord, DiffRow, DiffTable, RefFileType, ReferenceRecord, SnrRecord,
    DIFF_HEADER, SENTINEL,
};

// ---------------------------------------------------------------------------
// Reference catalog
// ---------------------------------------------------------------------------

/// Load a whitespace-delimited reference catalog using the column layout of
/// `ref_type`.
pub fn load_reference(path: &Path, ref_type: RefFileType) -> Result<Vec<ReferenceRecord>> {
    let text = read_lossy(path, "reference")?;
    let records = parse_reference(&text, ref_type);
    info!(
        "reference file {}: {} rows ({ref_type} layout)",
        path.display(),
        records.len()
    );
    Ok(records)
}

/// Parse reference rows. `#` lines, a textual header row, and rows too short
/// or non-numeric for the layout are skipped.
pub fn parse_reference(text: &str, ref_type: RefFileType) -> Vec<ReferenceRecord> {
    let cols = ref_type.columns();
    let width = cols.min_width();
    let mut records = Vec::new();

    for (line_no, tokens) in whitespace_rows(text) {
        if tokens.len() < width {
            debug!(
                "reference line {line_no}: {} columns, layout needs {width}; skipped",
                tokens.len()
            );
            continue;
        }
        let (Ok(redshift), Ok(magnitude)) = (
            tokens[cols.redshift].parse::<f64>(),
            tokens[cols.magnitude].parse::<f64>(),
        ) else {
            debug!("reference line {line_no}: non-numeric redshift/magnitude; skipped");
            continue;
        };
        let optional = |idx: Option<usize>| {
            idx.and_then(|i| tokens[i].parse::<f64>().ok())
                .and_then(non_sentinel)
        };

        records.push(ReferenceRecord {
            id: tokens[0].to_string(),
            redshift,
            magnitude,
            flag: cols.flag.and_then(|i| parse_flag(tokens[i])),
            sfr: optional(cols.sfr),
            ebmv: optional(cols.ebmv),
            sigma: optional(cols.sigma),
            raw: tokens.iter().map(|t| t.to_string()).collect(),
        });
    }
    records
}

// ---------------------------------------------------------------------------
// Computed results
// ---------------------------------------------------------------------------

/// Load the tab-delimited pipeline output.
pub fn load_computed(path: &Path) -> Result<Vec<ComputedRecord>> {
    let text = read_lossy(path, "computed")?;
    let records = parse_computed(&text);
    info!("computed file {}: {} rows", path.display(), records.len());
    Ok(records)
}

/// Parse computed rows: `id z merit method [template ...]`.
pub fn parse_computed(text: &str) -> Vec<ComputedRecord> {
    let mut records = Vec::new();
    for (row_no, fields) in tab_rows(text).into_iter().enumerate() {
        match computed_from_fields(&fields) {
            Some(rec) => records.push(rec),
            None => debug!("computed row {row_no}: {} columns; skipped", fields.len()),
        }
    }
    records
}

fn computed_from_fields(fields: &[String]) -> Option<ComputedRecord> {
    if fields.len() < 4 {
        return None;
    }
    Some(ComputedRecord {
        id: fields[0].clone(),
        redshift: fields[1].parse().ok()?,
        merit: fields[2].parse().ok()?,
        method: fields[3].clone(),
        template: fields.get(4).cloned(),
    })
}

// ---------------------------------------------------------------------------
// SNR table
// ---------------------------------------------------------------------------

/// Load the optional `id snr` table.
pub fn load_snr(path: &Path) -> Result<Vec<SnrRecord>> {
    let text = read_lossy(path, "SNR")?;
    let records = parse_snr(&text);
    info!("SNR file {}: {} rows", path.display(), records.len());
    Ok(records)
}

pub fn parse_snr(text: &str) -> Vec<SnrRecord> {
    whitespace_rows(text)
        .filter_map(|(line_no, tokens)| {
            let snr = tokens.get(1).and_then(|t| t.parse::<f64>().ok());
            match snr {
                Some(snr) => Some(SnrRecord {
                    id: tokens[0].to_string(),
                    snr,
                }),
                None => {
                    debug!("SNR line {line_no}: no numeric value; skipped");
                    None
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Diff export
// ---------------------------------------------------------------------------

/// Reload a diff export written by [`crate::export::write_diff`].
pub fn load_diff(path: &Path) -> Result<DiffTable> {
    let text = read_lossy(path, "diff")?;
    let table = parse_diff(&text);
    info!("diff file {}: {} rows", path.display(), table.len());
    Ok(table)
}

pub fn parse_diff(text: &str) -> DiffTable {
    let header = text
        .lines()
        .next()
        .filter(|l| l.contains('#'))
        .map(|l| l.to_string());

    let mut rows = Vec::new();
    for (row_no, fields) in tab_rows(text).into_iter().enumerate() {
        if fields.len() != DIFF_HEADER.len() {
            debug!("diff row {row_no}: {} columns; skipped", fields.len());
            continue;
        }
        match diff_from_fields(&fields) {
            Some(row) => rows.push(row),
            None => debug!("diff row {row_no}: non-numeric field; skipped"),
        }
    }
    DiffTable { header, rows }
}

fn diff_from_fields(f: &[String]) -> Option<DiffRow> {
    let num = |i: usize| f[i].parse::<f64>().ok();
    let opt = |i: usize| num(i).map(non_sentinel);
    let text = |i: usize| (f[i] != "-1").then(|| f[i].clone());

    let calc_redshift = opt(4)?;
    let matched = calc_redshift.is_some();
    Some(DiffRow {
        id: f[0].clone(),
        magnitude: num(1)?,
        ref_redshift: num(2)?,
        flag: parse_flag(&f[3]),
        calc_redshift,
        merit: if matched { Some(num(5)?) } else { None },
        template: text(6),
        method: text(7),
        snr: opt(8)?,
        sfr: opt(9)?,
        ebmv: opt(10)?,
        sigma: opt(11)?,
        diff: if matched { Some(num(12)?) } else { None },
    })
}

// ---------------------------------------------------------------------------
// Tokenizers
// ---------------------------------------------------------------------------

/// Non-comment, non-blank lines split on runs of whitespace.
fn whitespace_rows<'a>(text: &'a str) -> impl Iterator<Item = (usize, Vec<&'a str>)> + 'a {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        Some((i + 1, line.split_whitespace().collect()))
    })
}

/// Read a text file, replacing invalid UTF-8 so a stray byte only spoils its
/// own row.
fn read_lossy(path: &Path, what: &str) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {what} file {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            debug!("{what} file {}: invalid UTF-8 replaced", path.display());
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Tab-delimited rows with empty cells dropped, as the pipeline pads columns
/// with repeated tabs. Rows the reader rejects are skipped.
fn tab_rows(text: &str) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("tab-delimited row {row_no}: {e}; skipped");
                continue;
            }
        };
        let fields: Vec<String> = record
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        if !fields.is_empty() {
            rows.push(fields);
        }
    }
    rows
}

fn parse_flag(tok: &str) -> Option<i64> {
    let v = tok
        .parse::<i64>()
        .ok()
        .or_else(|| tok.parse::<f64>().ok().map(|f| f as i64))?;
    (v as f64 != SENTINEL).then_some(v)
}
