//! Aligned records and the unified diff rows built from them.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::align::{AlignmentReport, IdMatcher, IdResolver};
use crate::data::model::{valid_redshift, ComputedRecord, DiffRow, ReferenceRecord, SnrRecord};

// ---------------------------------------------------------------------------
// AlignedRecord
// ---------------------------------------------------------------------------

/// A reference object with whatever the pipeline and the SNR table said
/// about it.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    pub reference: ReferenceRecord,
    pub computed: Option<ComputedRecord>,
    pub snr: Option<f64>,
}

impl AlignedRecord {
    /// `zcalc - zref`.
    pub fn diff(&self) -> Option<f64> {
        self.computed
            .as_ref()
            .map(|c| c.redshift - self.reference.redshift)
    }

    /// `(zcalc - zref) / (1 + zref)`; absent when unmatched or when the
    /// reference redshift is the "no value" marker.
    pub fn normalized_error(&self) -> Option<f64> {
        let diff = self.diff()?;
        let zref = self.reference.redshift;
        valid_redshift(zref).then(|| diff / (1.0 + zref))
    }

    pub fn to_row(&self) -> DiffRow {
        let r = &self.reference;
        let c = self.computed.as_ref();
        DiffRow {
            id: c.map_or_else(|| r.id.clone(), |c| c.id.clone()),
            magnitude: r.magnitude,
            ref_redshift: r.redshift,
            flag: r.flag,
            calc_redshift: c.map(|c| c.redshift),
            merit: c.map(|c| c.merit),
            template: c.and_then(|c| c.template.clone()),
            method: c.map(|c| c.method.clone()),
            snr: self.snr,
            sfr: r.sfr,
            ebmv: r.ebmv,
            sigma: r.sigma,
            diff: self.diff(),
        }
    }
}

// ---------------------------------------------------------------------------
// Alignment of the three datasets
// ---------------------------------------------------------------------------

/// Output of [`align_records`]: one record per reference row.
#[derive(Debug, Clone)]
pub struct AlignedSet {
    pub records: Vec<AlignedRecord>,
    pub computed_report: AlignmentReport,
    pub snr_report: Option<AlignmentReport>,
}

impl AlignedSet {
    pub fn rows(&self) -> Vec<DiffRow> {
        self.records.iter().map(AlignedRecord::to_row).collect()
    }
}

/// Attach computed results and SNR values to every reference row.
///
/// `snr == None` means the SNR table does not exist; every record then has
/// no SNR.
pub fn align_records<M, N>(
    reference: &[ReferenceRecord],
    computed: &[ComputedRecord],
    snr: Option<&[SnrRecord]>,
    computed_resolver: &IdResolver<M>,
    snr_resolver: &IdResolver<N>,
) -> AlignedSet
where
    M: IdMatcher,
    N: IdMatcher,
{
    let ref_ids: Vec<&str> = reference.iter().map(|r| r.id.as_str()).collect();

    let calc_ids: Vec<&str> = computed.iter().map(|c| c.id.as_str()).collect();
    let calc = computed_resolver.resolve("computed", &ref_ids, &calc_ids);

    let snr_alignment = snr.map(|table| {
        let ids: Vec<&str> = table.iter().map(|s| s.id.as_str()).collect();
        (table, snr_resolver.resolve("SNR", &ref_ids, &ids))
    });

    let records = reference
        .iter()
        .enumerate()
        .map(|(k, reference)| {
            let snr = snr_alignment
                .as_ref()
                .and_then(|(table, a)| a.indices[k].map(|i| table[i].snr));
            AlignedRecord {
                reference: reference.clone(),
                computed: calc.indices[k].map(|i| computed[i].clone()),
                snr,
            }
        })
        .collect();

    AlignedSet {
        records,
        computed_report: calc.report,
        snr_report: snr_alignment.map(|(_, a)| a.report),
    }
}

// ---------------------------------------------------------------------------
// Categorical subsets
// ---------------------------------------------------------------------------

/// Column used to split rows into comparison subsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubsetKey {
    #[default]
    Method,
    #[serde(alias = "tpl")]
    #[value(alias = "tpl")]
    Template,
}

impl SubsetKey {
    fn label<'a>(&self, row: &'a DiffRow) -> Option<&'a str> {
        match self {
            SubsetKey::Method => row.method.as_deref(),
            SubsetKey::Template => row.template.as_deref(),
        }
    }
}

/// Rows sharing one method or template label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    pub label: String,
    pub indices: Vec<usize>,
}

impl Subset {
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

/// Group rows by `key`, ordered by label. Rows without a label (unmatched,
/// or no template column) belong to no subset.
pub fn partition(rows: &[DiffRow], key: SubsetKey) -> Vec<Subset> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        if let Some(label) = key.label(row) {
            groups.entry(label).or_default().push(i);
        }
    }
    groups
        .into_iter()
        .map(|(label, indices)| Subset {
            label: label.to_string(),
            indices,
        })
        .collect()
}

/// The first `cap` subsets, the ones drawn in comparison figures.
pub fn visible_subsets(subsets: &[Subset], cap: usize) -> &[Subset] {
    &subsets[..subsets.len().min(cap)]
}
