use proptest::prelude::*;

use redshift_diff::align::IdResolver;
use redshift_diff::data::model::{ComputedRecord, DiffRow, ReferenceRecord};
use redshift_diff::diff::align_records;
use redshift_diff::failures::FailureClassifier;
use redshift_diff::stats::{cumulative_histogram, fine_edges, BRIEF_EDGES};

fn row(zref: f64, zcalc: f64) -> DiffRow {
    DiffRow {
        id: "obj".into(),
        magnitude: 22.0,
        ref_redshift: zref,
        flag: None,
        calc_redshift: Some(zcalc),
        merit: Some(0.0),
        template: None,
        method: Some("lm".into()),
        snr: None,
        sfr: None,
        ebmv: None,
        sigma: None,
        diff: Some(zcalc - zref),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_cumulative_histogram_is_monotone(values in prop::collection::vec(0.0f64..9.99, 1..300)) {
        let hist = cumulative_histogram(&values, &fine_edges());
        let p = hist.percents();
        prop_assert!(p.windows(2).all(|w| w[0] <= w[1]));
        // last edge (10) covers every value
        prop_assert!((p[p.len() - 1] - 100.0).abs() < 1e-9);
        prop_assert!(p.iter().all(|&x| (0.0..=100.0).contains(&x)));
    }

    #[test]
    fn prop_failure_iff_strictly_above(
        zref in 0.0f64..4.0,
        zcalc in 0.0f64..4.0,
        threshold in 0.0001f64..0.5,
    ) {
        let classifier = FailureClassifier::new(threshold, ".fits", Vec::new());
        let r = row(zref, zcalc);
        let err = (zcalc - zref) / (1.0 + zref);
        prop_assert_eq!(classifier.is_failure(&r), err.abs() > threshold);
        prop_assert_eq!(classifier.classify(&[r]).len(), usize::from(err.abs() > threshold));
    }

    #[test]
    fn prop_alignment_keeps_every_reference_row(
        ref_ids in prop::collection::vec("[a-f]{3}", 0..40),
        calc_ids in prop::collection::vec("[a-f]{5}", 0..40),
    ) {
        let reference: Vec<ReferenceRecord> = ref_ids
            .iter()
            .map(|id| ReferenceRecord {
                id: id.clone(),
                redshift: 1.0,
                magnitude: 20.0,
                flag: None,
                sfr: None,
                ebmv: None,
                sigma: None,
                raw: vec![id.clone()],
            })
            .collect();
        let computed: Vec<ComputedRecord> = calc_ids
            .iter()
            .map(|id| ComputedRecord {
                id: id.clone(),
                redshift: 1.1,
                merit: 0.0,
                method: "lm".into(),
                template: None,
            })
            .collect();
        let resolver = IdResolver::containment(Vec::new());
        let set = align_records(&reference, &computed, None, &resolver, &resolver);

        prop_assert_eq!(set.records.len(), reference.len());
        let unmatched = set.records.iter().filter(|r| r.computed.is_none()).count();
        prop_assert_eq!(unmatched, set.computed_report.misses.len());
    }
}

#[test]
fn error_equal_to_threshold_is_not_a_failure() {
    let classifier = FailureClassifier::new(0.25, ".fits", Vec::new());
    // (0.25 - 0) / (1 + 0) == 0.25 exactly
    assert!(!classifier.is_failure(&row(0.0, 0.25)));
    assert!(classifier.is_failure(&row(0.0, 0.2500001)));
}

#[test]
fn brief_table_reaches_full_range() {
    let hist = cumulative_histogram(&[1e-6, 0.003, 0.2, 9.0], &BRIEF_EDGES);
    let p = hist.percents();
    assert_eq!(p[0], 25.0);
    assert_eq!(p[4], 50.0);
    assert_eq!(p[8], 100.0);
}
