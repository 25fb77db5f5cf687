//! Marker instrumentation of canonicalized translation units.
//!
//! Probe ids are handed out during a single pre-order walk in source order.
//! At each node the walk allocates, in this order: the node's own entry
//! probes (then before else; a case label's own run), its fall-through probe,
//! and then everything below it. Downstream tooling correlates probe ids
//! across runs, so this order is part of the output format.

use super::body::{
    has_braced_body, is_block, BodyKind, BodyPosition, BracelessSwitch, CaseRun, ConstructKind,
};
use super::{preorder, EngineError, PassOutput, SiteDiagnostic, SkipReason};
use crate::ledger::EditSet;
use crate::markers::{marker_call, marker_declaration};
use crate::ts::span::line_column;
use crate::ts::{first_token, ParsedSource};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Allocator of probe ids for one translation unit.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    prefix: String,
    next: usize,
}

impl MarkerRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    /// Next id; ids are dense and start at zero.
    pub fn allocate(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids allocated so far.
    pub fn count(&self) -> usize {
        self.next
    }

    pub fn call(&self, id: usize) -> String {
        marker_call(&self.prefix, id)
    }

    /// Forward declarations of every allocated probe, one per line.
    pub fn declarations(&self) -> String {
        (0..self.next)
            .map(|id| marker_declaration(&self.prefix, id) + "\n")
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// First statement of a branch, loop body, or case body.
    Entry,
    /// Right after a construct that contains a return.
    FallThrough,
}

/// Where one probe id was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeSite {
    pub id: usize,
    pub kind: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyKind>,
    pub construct: ConstructKind,
    /// 1-based position of the block (entry) or construct (fall-through).
    pub line: usize,
    pub column: usize,
}

/// Instrument one canonicalized translation unit with probes named
/// `<prefix><id>_`.
///
/// A unit without eligible sites yields an empty edit set.
pub fn instrument(
    file: &Path,
    parsed: &ParsedSource<'_>,
    prefix: &str,
) -> Result<PassOutput, EngineError> {
    let mut pass = Instrumenter {
        file,
        registry: MarkerRegistry::new(prefix),
        output: PassOutput::new(EditSet::new(file)),
    };

    preorder(parsed.root_node(), |node| pass.visit(node))?;

    let Instrumenter {
        registry,
        mut output,
        ..
    } = pass;
    if registry.count() > 0 {
        output.edits.insert(0, registry.declarations())?;
    }
    debug!(
        file = %file.display(),
        probes = registry.count(),
        skipped = output.diagnostics.len(),
        "instrumented"
    );
    Ok(output)
}

struct Instrumenter<'a> {
    file: &'a Path,
    registry: MarkerRegistry,
    output: PassOutput,
}

impl Instrumenter<'_> {
    fn visit(&mut self, node: Node<'_>) -> Result<(), EngineError> {
        // Without braces the switch's probe belongs to its first label
        if let Some(switch) = BracelessSwitch::headed_by(node) {
            if contains_exit(switch.governed) {
                self.fall_through(switch.anchor, switch.governed, ConstructKind::Switch)?;
            }
        }

        for position in BodyPosition::of(node) {
            self.entry(position)?;
        }

        if let Some(kind) = ConstructKind::of(node) {
            let braceless = kind == ConstructKind::Switch && !has_braced_body(node);
            if kind.falls_through() && !braceless && contains_exit(node) {
                self.fall_through(node, node, kind)?;
            }
        }
        Ok(())
    }

    fn entry(&mut self, position: BodyPosition<'_>) -> Result<(), EngineError> {
        let construct = position.construct_kind();
        let body_kind = position.body_kind();
        match position {
            BodyPosition::ConditionalBranch { body, .. } | BodyPosition::LoopBody { body, .. } => {
                if is_block(body) {
                    self.entry_probe(body, construct, body_kind)
                } else {
                    self.skip(body, SkipReason::NotABlock);
                    Ok(())
                }
            }
            BodyPosition::SwitchCaseBody { label, run } => match run {
                CaseRun::Block(block) => self.entry_probe(block, construct, body_kind),
                CaseRun::GroupMember => Ok(()),
                _ => {
                    self.skip(label, SkipReason::NotABlock);
                    Ok(())
                }
            },
        }
    }

    fn entry_probe(
        &mut self,
        block: Node<'_>,
        construct: ConstructKind,
        body: BodyKind,
    ) -> Result<(), EngineError> {
        let brace = first_token(block);
        let id = self.registry.allocate();
        self.output
            .edits
            .insert(brace.end_byte(), format!("\n{}", self.registry.call(id)))?;
        self.record_site(block, id, ProbeKind::Entry, Some(body), construct);
        Ok(())
    }

    /// Probe right after `last`, the end of the construct starting at `node`.
    fn fall_through(
        &mut self,
        node: Node<'_>,
        last: Node<'_>,
        construct: ConstructKind,
    ) -> Result<(), EngineError> {
        if last.has_error() {
            self.skip(node, SkipReason::SyntaxError);
            return Ok(());
        }
        if !in_statement_list(node) {
            self.skip(node, SkipReason::NotInStatementList);
            return Ok(());
        }
        let id = self.registry.allocate();
        self.output
            .edits
            .insert(last.end_byte(), format!("\n{}", self.registry.call(id)))?;
        self.record_site(node, id, ProbeKind::FallThrough, None, construct);
        Ok(())
    }

    fn record_site(
        &mut self,
        node: Node<'_>,
        id: usize,
        kind: ProbeKind,
        body: Option<BodyKind>,
        construct: ConstructKind,
    ) {
        let (line, column) = line_column(node);
        debug!(id, ?kind, %construct, line, "allocated probe");
        self.output.sites.push(ProbeSite {
            id,
            kind,
            body,
            construct,
            line,
            column,
        });
    }

    fn skip(&mut self, node: Node<'_>, reason: SkipReason) {
        let diagnostic = SiteDiagnostic::at(node, reason);
        warn!(
            file = %self.file.display(),
            line = diagnostic.line,
            column = diagnostic.column,
            %reason,
            "skipping probe site"
        );
        self.output.diagnostics.push(diagnostic);
    }
}

/// Whether a `return` can leave `node` early. Lambda bodies return from the
/// lambda, not from the enclosing function.
fn contains_exit(node: Node<'_>) -> bool {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "return_statement" | "co_return_statement" => return true,
            "lambda_expression" => continue,
            _ => {}
        }
        let mut cursor = current.walk();
        stack.extend(current.named_children(&mut cursor));
    }
    false
}

/// Whether a statement inserted after `node` would be part of a statement
/// list rather than, say, the tail of an `else`.
fn in_statement_list(node: Node<'_>) -> bool {
    let mut parent = node.parent();
    while let Some(current) = parent {
        match current.kind() {
            "labeled_statement" | "attributed_statement" => parent = current.parent(),
            "compound_statement" | "case_statement" => return true,
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::{CParser, SourceLang};

    fn run_lang(lang: SourceLang, source: &str) -> (String, PassOutput) {
        let mut parser = CParser::new(lang).unwrap();
        let parsed = parser.parse_with_source(source).unwrap();
        let output = instrument(Path::new("t.c"), &parsed, "Marker").unwrap();
        (output.edits.apply_to(source).unwrap(), output)
    }

    fn run(source: &str) -> (String, PassOutput) {
        run_lang(SourceLang::C, source)
    }

    fn ids(output: &PassOutput) -> Vec<(usize, ProbeKind, ConstructKind)> {
        output
            .sites
            .iter()
            .map(|site| (site.id, site.kind, site.construct))
            .collect()
    }

    #[test]
    fn branches_get_entry_probes() {
        let (text, output) =
            run("int f(int a) { if (a > 0) {a = 1;} else {a = 0;} return a; }");
        assert_eq!(
            text,
            "void Marker0_(void);\nvoid Marker1_(void);\n\
             int f(int a) { if (a > 0) {\nMarker0_();a = 1;} else {\nMarker1_();a = 0;} return a; }"
        );
        assert_eq!(output.sites[1].body, Some(BodyKind::Else));
    }

    #[test]
    fn nested_numbering_is_preorder() {
        let (_, output) =
            run("int f(int a) { if (a) { if (a > 1) {return 1;} } else {a = 0;} return a; }");
        assert_eq!(
            ids(&output),
            vec![
                (0, ProbeKind::Entry, ConstructKind::If),
                (1, ProbeKind::Entry, ConstructKind::If),
                (2, ProbeKind::FallThrough, ConstructKind::If),
                (3, ProbeKind::Entry, ConstructKind::If),
                (4, ProbeKind::FallThrough, ConstructKind::If),
            ]
        );
    }

    #[test]
    fn fallthrough_group_gets_one_probe() {
        let (text, output) = run("void f(int a) { switch (a) { case 1: case 2: {a = 1; break;} } }");
        assert_eq!(output.sites.len(), 1);
        assert_eq!(
            text,
            "void Marker0_(void);\n\
             void f(int a) { switch (a) { case 1: case 2: {\nMarker0_();a = 1; break;} } }"
        );
    }

    #[test]
    fn switch_fall_through_follows_closing_brace() {
        let source = "int f(int a) { switch (a) { case 1: {return 1;} default: {a = 2;} } return a; }";
        let (text, output) = run(source);
        assert_eq!(
            ids(&output),
            vec![
                (0, ProbeKind::FallThrough, ConstructKind::Switch),
                (1, ProbeKind::Entry, ConstructKind::Case),
                (2, ProbeKind::Entry, ConstructKind::Case),
            ]
        );
        assert!(text.contains("default: {\nMarker2_();a = 2;} }\nMarker0_(); return a;"));
        assert!(text.contains("case 1: {\nMarker1_();return 1;}"));
    }

    #[test]
    fn braceless_switch_ends_after_its_statement() {
        let (text, output) = run("int f(int a) { switch (a) case 1: {return 1;} return a; }");
        assert_eq!(
            ids(&output),
            vec![
                (0, ProbeKind::FallThrough, ConstructKind::Switch),
                (1, ProbeKind::Entry, ConstructKind::Case),
            ]
        );
        assert_eq!(
            text,
            "void Marker0_(void);\nvoid Marker1_(void);\n\
             int f(int a) { switch (a) case 1: {\nMarker1_();return 1;}\nMarker0_(); return a; }"
        );
    }

    #[test]
    fn loops_probe_body_and_fall_through() {
        let source = "int f(int a) { while (a) {if (a == 3) {return 1;} a--;} do {a++;} while (a < 3); return 0; }";
        let (text, output) = run(source);
        assert_eq!(
            ids(&output),
            vec![
                (0, ProbeKind::Entry, ConstructKind::While),
                (1, ProbeKind::FallThrough, ConstructKind::While),
                (2, ProbeKind::Entry, ConstructKind::If),
                (3, ProbeKind::FallThrough, ConstructKind::If),
                (4, ProbeKind::Entry, ConstructKind::DoWhile),
            ]
        );
        assert!(text.contains("a--;}\nMarker1_(); do {\nMarker4_();a++;} while (a < 3);"));
    }

    #[test]
    fn no_constructs_means_no_edits() {
        let source = "int g;\nint f(int a) { return a + g; }\n";
        let (text, output) = run(source);
        assert!(output.edits.is_empty());
        assert_eq!(text, source);
    }

    #[test]
    fn bare_bodies_are_reported() {
        let (_, output) = run("void f(int a) { if (a) a = 1; }");
        assert!(output.sites.is_empty());
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].reason, SkipReason::NotABlock);
    }

    #[test]
    fn fall_through_needs_a_statement_list() {
        let (_, output) = run("int f(int a) { if (a) {a = 1;} else if (a > 1) {return 1;} return 0; }");
        let reasons: Vec<_> = output.diagnostics.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::NotABlock, SkipReason::NotInStatementList]
        );
    }

    #[test]
    fn lambda_returns_do_not_count() {
        let (_, output) = run_lang(
            SourceLang::Cpp,
            "int f(int a) { if (a) { auto g = [](int b) { return b; }; a = g(a); } return a; }",
        );
        assert_eq!(ids(&output), vec![(0, ProbeKind::Entry, ConstructKind::If)]);
    }

    #[test]
    fn registry_declarations_are_ascending() {
        let mut registry = MarkerRegistry::new("P");
        assert_eq!(registry.declarations(), "");
        registry.allocate();
        registry.allocate();
        assert_eq!(registry.declarations(), "void P0_(void);\nvoid P1_(void);\n");
        assert_eq!(registry.call(1), "P1_();");
    }
}
