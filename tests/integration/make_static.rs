use super::{pipeline, transform};
use dce_probe::config::Passes;
use dce_probe::ts::SourceLang;

fn make_static(source: &str) -> String {
    transform(source, SourceLang::C, &pipeline(Passes::only_make_static(), "DCEMarker")).rewritten
}

#[test]
fn single_global() {
    assert_eq!(make_static("int a;\n"), "static int a;\n");
}

#[test]
fn two_globals() {
    assert_eq!(make_static("int a;\nint b;\n"), "static int a;\nstatic int b;\n");
}

#[test]
fn two_globals_already_static() {
    let source = "static int a;\nstatic int b;\n";
    assert_eq!(make_static(source), source);
}

#[test]
fn two_globals_one_already_static() {
    assert_eq!(
        make_static("int a;\nstatic int b;\n"),
        "static int a;\nstatic int b;\n"
    );
}

#[test]
fn functions_except_main() {
    assert_eq!(
        make_static(
            "int main() { return 0;}\nint foo(){ return 42;}\nstatic int bar(){ return 42;}\n"
        ),
        "int main() { return 0;}\nstatic int foo(){ return 42;}\nstatic int bar(){ return 42;}\n"
    );
}

#[test]
fn locals_are_not_touched() {
    assert_eq!(
        make_static("int f(void) { int x = 1; return x; }\n"),
        "static int f(void) { int x = 1; return x; }\n"
    );
}

#[test]
fn runs_before_instrumentation() {
    let mut passes = Passes::default();
    passes.make_static = true;
    let report = transform(
        "int g;\nint f(int a) { if (a) g = a; return g; }\nint main(void) { return f(1); }\n",
        SourceLang::C,
        &pipeline(passes, "P"),
    );
    assert_eq!(
        report.rewritten,
        "void P0_(void);\n\
         static int g;\n\
         static int f(int a) { if (a) {\nP0_();g = a;} return g; }\n\
         int main(void) { return f(1); }\n"
    );
}
