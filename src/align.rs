//! Identity resolution between the reference catalog and the datasets derived
//! from it.
//!
//! Pipeline output files are named after the reference id but carry
//! pipeline-specific prefixes and suffixes, so the default strategy accepts a
//! candidate when its cleaned id *contains* the reference id. The first
//! candidate in file order wins; further containing candidates are counted and
//! reported as ambiguities.

use log::{info, log, warn, Level};

// ---------------------------------------------------------------------------
// Matching strategies
// ---------------------------------------------------------------------------

/// Decides whether a candidate id refers to a reference object.
pub trait IdMatcher {
    fn matches(&self, reference_id: &str, candidate_id: &str) -> bool;
}

/// Candidate id contains the reference id as a substring.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsMatcher;

impl IdMatcher for ContainsMatcher {
    fn matches(&self, reference_id: &str, candidate_id: &str) -> bool {
        candidate_id.contains(reference_id)
    }
}

/// Candidate id equals the reference id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl IdMatcher for ExactMatcher {
    fn matches(&self, reference_id: &str, candidate_id: &str) -> bool {
        candidate_id == reference_id
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// `index` is the first matching candidate; `others` counts the
    /// additional candidates that also matched.
    Found { index: usize, others: usize },
    NotFound,
}

/// A reference id matched by more than one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub reference_id: String,
    pub chosen: String,
    pub candidates: usize,
}

/// Aggregated misses and ambiguities of one alignment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentReport {
    /// Which dataset was aligned ("computed", "SNR", ...).
    pub dataset: String,
    pub total: usize,
    pub misses: Vec<String>,
    pub ambiguous: Vec<Ambiguity>,
}

impl AlignmentReport {
    pub fn matched(&self) -> usize {
        self.total - self.misses.len()
    }

    /// Log a one-line summary, plus the ambiguous ids at `warn`.
    pub fn log_summary(&self) {
        if self.misses.is_empty() && self.ambiguous.is_empty() {
            info!(
                "{}: all {} reference ids matched",
                self.dataset,
                self.total
            );
            return;
        }
        warn!(
            "{}: {}/{} reference ids matched, {} missing, {} ambiguous",
            self.dataset,
            self.matched(),
            self.total,
            self.misses.len(),
            self.ambiguous.len()
        );
        for a in &self.ambiguous {
            warn!(
                "{}: '{}' matched {} candidates, kept '{}'",
                self.dataset, a.reference_id, a.candidates, a.chosen
            );
        }
    }
}

/// Per-reference candidate indices plus the report that produced them.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub indices: Vec<Option<usize>>,
    pub report: AlignmentReport,
}

// ---------------------------------------------------------------------------
// IdResolver
// ---------------------------------------------------------------------------

/// Aligns candidate ids to reference ids after stripping known filename
/// decorations from the candidates.
#[derive(Debug, Clone)]
pub struct IdResolver<M = ContainsMatcher> {
    matcher: M,
    decorations: Vec<String>,
    miss_level: Level,
}

impl IdResolver<ContainsMatcher> {
    pub fn containment(decorations: Vec<String>) -> Self {
        Self::new(ContainsMatcher, decorations)
    }
}

impl<M: IdMatcher> IdResolver<M> {
    pub fn new(matcher: M, decorations: Vec<String>) -> Self {
        Self {
            matcher,
            decorations,
            miss_level: Level::Error,
        }
    }

    /// Level used for the per-id "not found" message.
    pub fn with_miss_level(mut self, level: Level) -> Self {
        self.miss_level = level;
        self
    }

    /// Remove every configured decoration, in order.
    pub fn clean(&self, id: &str) -> String {
        self.decorations
            .iter()
            .filter(|d| !d.is_empty())
            .fold(id.to_string(), |acc, d| acc.replace(d.as_str(), ""))
    }

    /// Locate `reference_id` among already-cleaned candidates.
    pub fn find<S: AsRef<str>>(&self, reference_id: &str, cleaned: &[S]) -> MatchOutcome {
        let mut hits = cleaned
            .iter()
            .enumerate()
            .filter(|(_, c)| self.matcher.matches(reference_id, c.as_ref()))
            .map(|(i, _)| i);
        match hits.next() {
            Some(index) => MatchOutcome::Found {
                index,
                others: hits.count(),
            },
            None => MatchOutcome::NotFound,
        }
    }

    /// Align every reference id to the candidate list. The result has one
    /// entry per reference id; misses never abort the pass.
    pub fn resolve<R, C>(&self, dataset: &str, reference_ids: &[R], candidates: &[C]) -> Alignment
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        let cleaned: Vec<String> = candidates.iter().map(|c| self.clean(c.as_ref())).collect();
        let mut report = AlignmentReport {
            dataset: dataset.to_string(),
            total: reference_ids.len(),
            ..Default::default()
        };

        let indices = reference_ids
            .iter()
            .map(|r| {
                let rid = r.as_ref();
                match self.find(rid, &cleaned) {
                    MatchOutcome::Found { index, others } => {
                        if others > 0 {
                            report.ambiguous.push(Ambiguity {
                                reference_id: rid.to_string(),
                                chosen: candidates[index].as_ref().to_string(),
                                candidates: others + 1,
                            });
                        }
                        Some(index)
                    }
                    MatchOutcome::NotFound => {
                        log!(self.miss_level, "{dataset}: index not found for '{rid}'");
                        report.misses.push(rid.to_string());
                        None
                    }
                }
            })
            .collect();

        Alignment { indices, report }
    }
}
