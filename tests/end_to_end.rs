use std::fs;
use std::path::Path;

use redshift_diff::align::IdResolver;
use redshift_diff::config::{ComputeLevel, RunConfig};
use redshift_diff::data::loader::{load_diff, parse_computed, parse_reference};
use redshift_diff::data::model::RefFileType;
use redshift_diff::diff::align_records;
use redshift_diff::error::{InputError, InputRole};
use redshift_diff::export::{write_diff, JsonSeriesSink};
use redshift_diff::pipeline::{self, DIFF_FILE, FAILURES_FILE, FAILURES_REF_FILE, FAILURES_SPECTRUM_LIST};

const REFERENCE: &str = "\
#ID Z MAG TYPE EBMV SFR SIGMA
a 1.0 21.0 gal 0.1 2.0 80
b 2.0 22.5 gal 0.2 -1 120
c 0.5 23.0 gal 0.0 0.7 60
";

const COMPUTED: &str = "\
#Spectrum\tRedshift\tMerit\tMethod\tTemplate
x_a_y\t1.01\t5.0\tlinemodel
x_c_y\t0.49\t3.0\tchisquare2solve\tScd.txt
";

fn write_inputs(dir: &Path, computed: &str) -> RunConfig {
    let reference = dir.join("reference.txt");
    let calc = dir.join("redshift.csv");
    fs::write(&reference, REFERENCE).unwrap();
    fs::write(&calc, computed).unwrap();
    RunConfig {
        reference,
        computed: calc,
        output_dir: Some(dir.join("out")),
        ref_type: RefFileType::Pfs,
        compute_level: ComputeLevel::Full,
        ..Default::default()
    }
}

#[test]
fn unmatched_reference_rows_are_kept() {
    let reference = parse_reference(REFERENCE, RefFileType::Pfs);
    let computed = parse_computed(COMPUTED);
    let resolver = IdResolver::containment(Vec::new());
    let set = align_records(&reference, &computed, None, &resolver, &resolver);

    assert_eq!(set.records.len(), reference.len());
    assert_eq!(set.computed_report.misses, vec!["b".to_string()]);

    let a = set.records[0].normalized_error().unwrap();
    let b = &set.records[1];
    let c = set.records[2].normalized_error().unwrap();
    assert!((a - 0.005).abs() < 1e-9);
    assert!(b.computed.is_none());
    assert_eq!(b.normalized_error(), None);
    assert!((c + 0.0066667).abs() < 1e-6);
    assert_eq!(a, (1.01 - 1.0) / (1.0 + 1.0));
}

#[test]
fn diff_export_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let reference = parse_reference(REFERENCE, RefFileType::Pfs);
    let computed = parse_computed(COMPUTED);
    let resolver = IdResolver::containment(Vec::new());
    let rows = align_records(&reference, &computed, None, &resolver, &resolver).rows();

    let path = dir.path().join(DIFF_FILE);
    write_diff(&path, &rows).unwrap();
    let table = load_diff(&path).unwrap();

    assert_eq!(table.rows, rows);
    assert!(table.header.unwrap().starts_with("#ID\tMAGI\tZREF"));
}

#[test]
fn full_run_writes_every_export() {
    let dir = tempfile::tempdir().unwrap();
    // c is now a catastrophic failure
    let computed = COMPUTED.replace("0.49", "1.30");
    let cfg = write_inputs(dir.path(), &computed);

    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));
    let summary = pipeline::run(&cfg, &mut sink).unwrap();

    assert_eq!(summary.reference_rows, 3);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.missing, vec!["b".to_string()]);
    assert_eq!(summary.snr_matched, None);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.failing_reference_rows, 1);
    assert_eq!(summary.stats_rows, Some(2));

    let out = dir.path().join("out");
    let diff = load_diff(&out.join(DIFF_FILE)).unwrap();
    assert_eq!(diff.len(), 3);
    assert!(!diff.rows[1].is_matched());

    let failures = fs::read_to_string(out.join(FAILURES_FILE)).unwrap();
    assert_eq!(failures.lines().count(), 2);
    assert!(failures.lines().nth(1).unwrap().starts_with("x_c_y\t"));

    let list = fs::read_to_string(out.join(FAILURES_SPECTRUM_LIST)).unwrap();
    assert_eq!(list, "x_c_y.fits\tx_c_y.fits\n");

    let refs = fs::read_to_string(out.join(FAILURES_REF_FILE)).unwrap();
    assert_eq!(refs, "c\t0.5\t23.0\tgal\t0.0\t0.7\t60\n");

    let stats = out.join("stats_magmin0magmax40_zmin-1zmax20");
    let brief = fs::read_to_string(stats.join("stats_brief.txt")).unwrap();
    assert_eq!(brief.lines().count(), 9);
    assert_eq!(brief.lines().last().unwrap(), "8\t10\t100");
    assert!(stats.join("stats.txt").is_file());
    assert!(stats.join("stats_versusSFR_hist.txt").is_file());

    let above: Vec<String> = pipeline::rows_above(&out, 0.01)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(above, vec!["x_c_y".to_string()]);
    assert_eq!(pipeline::rows_above(&out, -1.0).unwrap().len(), 3);

    assert!(sink.figures().contains_key("diff"));
    assert!(sink.figures().contains_key("stats_hist"));
    sink.finish().unwrap();
    assert!(dir.path().join("series.json").is_file());
}

#[test]
fn snr_table_beside_reference_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_inputs(dir.path(), COMPUTED);
    fs::write(
        dir.path().join("snr2_TF_ErrF.csv"),
        "SPC_fits-W-TF_a.fits 12.5\nSPC_fits-W-TF_c.fits 3.0\n",
    )
    .unwrap();

    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));
    let summary = pipeline::run(&cfg, &mut sink).unwrap();
    assert_eq!(summary.snr_matched, Some(2));

    let diff = load_diff(&dir.path().join("out").join(DIFF_FILE)).unwrap();
    assert_eq!(diff.rows[0].snr, Some(12.5));
    assert_eq!(diff.rows[1].snr, None);
}

#[test]
fn missing_inputs_fail_fast_with_role() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = write_inputs(dir.path(), COMPUTED);
    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));

    cfg.reference = dir.path().join("absent.txt");
    let err = pipeline::run(&cfg, &mut sink).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::ReferenceMissing(_))
    ));

    let mut cfg = write_inputs(dir.path(), COMPUTED);
    cfg.computed = dir.path().to_path_buf();
    let err = pipeline::run(&cfg, &mut sink).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::IsDirectory { .. })
    ));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn undecodable_snr_table_does_not_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_inputs(dir.path(), COMPUTED);
    fs::write(
        dir.path().join("snr2_TF_ErrF.csv"),
        b"\xff\xfe garbage\nSPC_fits-W-TF_a.fits 12.5\n",
    )
    .unwrap();

    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));
    let summary = pipeline::run(&cfg, &mut sink).unwrap();
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.snr_matched, Some(1));

    let diff = load_diff(&dir.path().join("out").join(DIFF_FILE)).unwrap();
    assert_eq!(diff.rows[0].snr, Some(12.5));
}

#[test]
fn snr_path_that_is_a_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = write_inputs(dir.path(), COMPUTED);
    let snr_dir = dir.path().join("snrdir");
    fs::create_dir(&snr_dir).unwrap();
    cfg.snr = Some(snr_dir);

    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));
    let err = pipeline::run(&cfg, &mut sink).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::IsDirectory {
            role: InputRole::Snr,
            ..
        })
    ));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn computed_file_with_stray_bytes_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = write_inputs(dir.path(), COMPUTED);
    let mut bytes = b"# r\xe9sultats\n".to_vec();
    bytes.extend_from_slice(COMPUTED.as_bytes());
    fs::write(&cfg.computed, bytes).unwrap();
    cfg.compute_level = ComputeLevel::Brief;

    let mut sink = JsonSeriesSink::new(dir.path().join("series.json"));
    let summary = pipeline::run(&cfg, &mut sink).unwrap();
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.missing, vec!["b".to_string()]);
}
