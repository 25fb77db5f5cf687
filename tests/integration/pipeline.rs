use dce_probe::config::{load_from_str, Passes};
use dce_probe::driver::{discover, run, Pipeline};
use dce_probe::ledger::{EditLedger, EditSet, LedgerError};
use dce_probe::markers::{alive_markers, dead_markers, declared_marker_count};
use dce_probe::ts::SourceSpan;
use std::fs;
use tempfile::TempDir;

fn setup_sources() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/collatz.c"),
        include_str!("../fixtures/collatz.c"),
    )
    .unwrap();
    fs::write(
        dir.path().join("src/classify.c"),
        include_str!("../fixtures/classify.c"),
    )
    .unwrap();
    fs::write(dir.path().join("src/notes.md"), "# not a source\n").unwrap();
    dir
}

#[test]
fn instruments_a_directory() {
    let dir = setup_sources();
    let units = discover(&[dir.path().join("src")]);
    assert_eq!(units.len(), 2);

    let report = run(&units, &Pipeline::default());

    assert!(report.is_success());
    assert_eq!(
        fs::read_to_string(dir.path().join("src/collatz.c")).unwrap(),
        include_str!("../fixtures/collatz.instrumented.c")
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("src/classify.c")).unwrap(),
        include_str!("../fixtures/classify.instrumented.c")
    );
}

#[test]
fn configuration_drives_the_pipeline() {
    let dir = setup_sources();
    let config = load_from_str(
        r#"
marker_prefix = "Probe"

[passes]
make_static = true
"#,
    )
    .unwrap();
    let file = dir.path().join("src/collatz.c");

    let report = run(&[file.clone()], &Pipeline::from(&config));

    assert!(report.is_success());
    let text = fs::read_to_string(&file).unwrap();
    assert!(text.starts_with("void Probe0_(void);\n"));
    assert!(text.contains("static int collatz(int n) {"));
    assert_eq!(declared_marker_count(&text, "Probe"), 6);
}

#[test]
fn second_instrumentation_run_is_stable_for_canonicalization() {
    let dir = setup_sources();
    let file = dir.path().join("src/collatz.c");
    let canonical_only = Pipeline {
        passes: Passes::only_canonicalize(),
        ..Pipeline::default()
    };

    run(&[file.clone()], &canonical_only);
    let once = fs::read_to_string(&file).unwrap();
    let report = run(&[file.clone()], &canonical_only);

    assert!(!report.files[0].changed());
    assert_eq!(fs::read_to_string(&file).unwrap(), once);
}

#[test]
fn units_disagreeing_on_a_shared_file_conflict() {
    let mut first = EditSet::new("shared.h");
    first
        .replace(SourceSpan { start: 10, end: 11 }, "{a", "a")
        .unwrap();
    let mut second = EditSet::new("shared.h");
    second
        .replace(SourceSpan { start: 10, end: 11 }, "{{a", "a")
        .unwrap();

    let mut ledger = EditLedger::new();
    ledger.merge(first).unwrap();
    let err = ledger.merge(second).unwrap_err();
    assert!(matches!(err, LedgerError::UnitConflict { .. }));
}

#[test]
fn probes_classified_from_assembly() {
    let report = run(&[], &Pipeline::default());
    assert!(report.files.is_empty());

    let dir = setup_sources();
    let file = dir.path().join("src/collatz.c");
    run(&[file.clone()], &Pipeline::default());
    let total = declared_marker_count(&fs::read_to_string(&file).unwrap(), "DCEMarker");

    // Pretend the compiler kept the loop and its overflow exit only
    let asm = "\
collatz:
        callq   DCEMarker0_@PLT
        callq   DCEMarker4_@PLT
        jmp     DCEMarker1_
";
    let alive = alive_markers(asm, "DCEMarker");
    assert_eq!(dead_markers(total, &alive), vec![2, 3, 5]);
}
