use super::{instrumented, pipeline, transform};
use dce_probe::config::Passes;
use dce_probe::engine::{ConstructKind, ProbeKind, SkipReason};
use dce_probe::markers::declared_marker_count;
use dce_probe::ts::SourceLang;

#[test]
fn if_else_end_to_end() {
    let report = instrumented(
        "int f(int a) { if (a > 0) a = 1; else a = 0; return a; }",
        "Marker",
    );
    assert_eq!(
        report.rewritten,
        "void Marker0_(void);\nvoid Marker1_(void);\n\
         int f(int a) { if (a > 0) {\nMarker0_();a = 1;} else {\nMarker1_();a = 0;} return a; }"
    );
}

#[test]
fn collatz_fixture() {
    let report = instrumented(include_str!("../fixtures/collatz.c"), "DCEMarker");
    assert_eq!(report.rewritten, include_str!("../fixtures/collatz.instrumented.c"));

    let kinds: Vec<_> = report
        .sites
        .iter()
        .map(|site| (site.kind, site.construct, site.line))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ProbeKind::Entry, ConstructKind::While, 3),
            (ProbeKind::FallThrough, ConstructKind::While, 3),
            (ProbeKind::Entry, ConstructKind::If, 5),
            (ProbeKind::Entry, ConstructKind::If, 7),
            (ProbeKind::Entry, ConstructKind::If, 9),
            (ProbeKind::FallThrough, ConstructKind::If, 8),
        ]
    );
}

#[test]
fn switch_fixture() {
    let report = instrumented(include_str!("../fixtures/classify.c"), "DCEMarker");
    assert_eq!(report.rewritten, include_str!("../fixtures/classify.instrumented.c"));
    assert_eq!(
        declared_marker_count(&report.rewritten, "DCEMarker"),
        report.sites.len()
    );
}

#[test]
fn fallthrough_group_gets_a_single_probe() {
    let report = instrumented(
        "void f(int a) { switch (a) { case 1: case 2: a = 1; break; } }",
        "Marker",
    );
    assert_eq!(
        report.rewritten,
        "void Marker0_(void);\n\
         void f(int a) { switch (a) { case 1: case 2: {\nMarker0_();a = 1; break;} } }"
    );
}

#[test]
fn probe_after_switch_is_only_reached_by_falling_through() {
    let report = instrumented(
        "int f(int a) { switch (a) { case 1: return 1; default: a = 2; } return a; }",
        "Marker",
    );
    // The returning case leaves before the after-switch probe
    assert!(report
        .rewritten
        .contains("case 1: {\nMarker1_();return 1;} default: {\nMarker2_();a = 2;} }\nMarker0_(); return a;"));
}

#[test]
fn rerunning_reproduces_the_numbering() {
    let source = include_str!("../fixtures/collatz.c");
    let first = instrumented(source, "DCEMarker");
    let second = instrumented(source, "DCEMarker");
    assert_eq!(first.rewritten, second.rewritten);
    assert_eq!(first.sites, second.sites);
}

#[test]
fn nothing_to_instrument_leaves_file_unchanged() {
    let source = "static int g;\nint main(void) { g = 1; return g; }\n";
    let report = instrumented(source, "Marker");
    assert!(!report.changed());
    assert!(report.sites.is_empty());
}

#[test]
fn uncanonical_input_is_reported() {
    let report = transform(
        "void f(int a) { while (a) a--; }",
        SourceLang::C,
        &pipeline(
            Passes {
                canonicalize: false,
                make_static: false,
                instrument: true,
            },
            "Marker",
        ),
    );
    assert!(!report.changed());
    assert_eq!(report.diagnostics[0].reason, SkipReason::NotABlock);
}

#[test]
fn cpp_lambda_returns_do_not_make_fall_through_probes() {
    let report = transform(
        "int f(int a) { if (a) { auto g = [](int b) { return b; }; a = g(a); } return a; }",
        SourceLang::Cpp,
        &pipeline(Passes::default(), "P"),
    );
    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].kind, ProbeKind::Entry);
}

#[test]
fn braceless_switch_keeps_the_following_statement_outside() {
    let report = instrumented("int f(int a) { switch (a) case 1: return 1; return a; }", "Marker");
    assert_eq!(
        report.rewritten,
        "void Marker0_(void);\nvoid Marker1_(void);\n\
         int f(int a) { switch (a) case 1: {\nMarker1_();return 1;}\nMarker0_(); return a; }"
    );
    assert_eq!(report.sites[0].kind, ProbeKind::FallThrough);
    assert_eq!(report.sites[0].construct, ConstructKind::Switch);
}
