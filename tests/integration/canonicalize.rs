use super::{canonical, pipeline, transform};
use dce_probe::config::Passes;
use dce_probe::engine::SkipReason;
use dce_probe::ts::SourceLang;

#[test]
fn if_else_branches_become_blocks() {
    assert_eq!(
        canonical("int f(int a) { if (a > 0) a = 1; else a = 0; return a; }"),
        "int f(int a) { if (a > 0) {a = 1;} else {a = 0;} return a; }"
    );
}

#[test]
fn loop_and_if_share_one_end_token() {
    assert_eq!(
        canonical("void f(int a) { for(;;) if (a>0) a=1; }\n"),
        "void f(int a) { for(;;) {if (a>0) {a=1;}} }\n"
    );
}

#[test]
fn every_loop_form() {
    let source = "\
int sum(int n) {
  int s = 0;
  for (int i = 0; i < n; i++)
    while (s < i)
      s += i;
  do
    s--;
  while (s > 100);
  return s;
}
";
    let expected = "\
int sum(int n) {
  int s = 0;
  for (int i = 0; i < n; i++)
    {while (s < i)
      {s += i;}}
  do
    {s--;}
  while (s > 100);
  return s;
}
";
    assert_eq!(canonical(source), expected);
}

#[test]
fn collatz_fixture() {
    assert_eq!(
        canonical(include_str!("../fixtures/collatz.c")),
        include_str!("../fixtures/collatz.canonical.c")
    );
}

#[test]
fn canonical_fixture_is_a_fixed_point() {
    let source = include_str!("../fixtures/collatz.canonical.c");
    let report = transform(
        source,
        SourceLang::C,
        &pipeline(Passes::only_canonicalize(), "Marker"),
    );
    assert!(!report.changed());
}

#[test]
fn switch_groups_share_one_block() {
    let source = "\
int classify(int c) {
  int r = 0;
  switch (c) {
  case 'a':
  case 'b':
    r = 1;
    break;
  case 'c': {
    r = 2;
    break;
  }
  default:
  }
  return r;
}
";
    let expected = "\
int classify(int c) {
  int r = 0;
  switch (c) {
  case 'a':
  case 'b':
    {r = 1;
    break;}
  case 'c': {
    r = 2;
    break;
  }
  default:{}
  }
  return r;
}
";
    assert_eq!(canonical(source), expected);
}

#[test]
fn comments_stay_outside_the_braces() {
    assert_eq!(
        canonical("void f(int a) { if (a) /* keep */ a = 1; // note\n}\n"),
        "void f(int a) { if (a) /* keep */ {a = 1;} // note\n}\n"
    );
}

#[test]
fn macro_calls_are_ordinary_statements() {
    assert_eq!(
        canonical("void f(int a) { while (a--) LOG(a); }"),
        "void f(int a) { while (a--) {LOG(a);} }"
    );
}

#[test]
fn cpp_range_for() {
    let report = transform(
        "int total(std::vector<int> v) { int t = 0; for (auto x : v) t += x; return t; }",
        SourceLang::Cpp,
        &pipeline(Passes::only_canonicalize(), "Marker"),
    );
    assert_eq!(
        report.rewritten,
        "int total(std::vector<int> v) { int t = 0; for (auto x : v) {t += x;} return t; }"
    );
}

#[test]
fn conditional_compilation_inside_blocks_is_wrapped() {
    let source = "\
void f(int a) {
  while (a)
    if (a > 2) {
#ifdef DEBUG
      a = 0;
#endif
    }
  for (;;) a++;
}
";
    let report = transform(
        source,
        SourceLang::C,
        &pipeline(Passes::only_canonicalize(), "Marker"),
    );
    assert!(report.rewritten.contains("  while (a)\n    {if (a > 2) {\n#ifdef DEBUG"));
    assert!(report.rewritten.contains("#endif\n    }}\n  for (;;) {a++;}"));
    assert!(report.diagnostics.is_empty());
}

#[test]
fn conditional_compilation_in_case_run_is_skipped_and_reported() {
    let source = "\
int f(int a) {
  switch (a) {
  case 1:
    struct P {
#ifdef DEBUG
      int y;
#endif
      int z;
    } p;
    p.z = a;
    return p.z;
  }
  for (;;) a++;
}
";
    let report = transform(
        source,
        SourceLang::C,
        &pipeline(Passes::only_canonicalize(), "Marker"),
    );
    assert!(report.rewritten.contains("  case 1:\n    struct P {"));
    assert!(report.rewritten.contains("for (;;) {a++;}"));
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].reason, SkipReason::PreprocessorDirective);
    assert_eq!(report.diagnostics[0].line, 3);
}

#[test]
fn broken_function_does_not_stop_the_rest() {
    let mut pipeline = pipeline(Passes::only_canonicalize(), "Marker");
    pipeline.verify_syntax = false;
    let report = transform(
        "void f(int a) { if (a) a = ; }\nvoid g(int b) { while (b) b--; }\n",
        SourceLang::C,
        &pipeline,
    );
    assert!(report.rewritten.ends_with("void g(int b) { while (b) {b--;} }\n"));
}

#[test]
fn no_constructs_no_change() {
    let source = "int g = 3;\nint f(int a) { a += g; return a; }\n";
    assert_eq!(canonical(source), source);
}
