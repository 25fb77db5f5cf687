//! Statement canonicalization: every body position becomes an explicit block.
//!
//! Opening braces are glued to the body's first token and closing braces to
//! its last token, so every edit replaces exactly one token. Several bodies
//! can share a last token (`for (;;) if (a) b;`), so closing braces are
//! collected per token as brace debt and written out once at the end.

use super::body::{is_block, is_null_statement, BodyPosition, CaseRun};
use super::{node_text, preorder, EngineError, PassOutput, SiteDiagnostic, SkipReason};
use crate::ledger::EditSet;
use crate::ts::span::any_descendant;
use crate::ts::{first_token, last_token, ParsedSource, SourceSpan};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Canonicalize one translation unit.
///
/// Already-canonical input yields an empty edit set.
pub fn canonicalize(file: &Path, parsed: &ParsedSource<'_>) -> Result<PassOutput, EngineError> {
    let mut pass = Canonicalizer {
        file,
        source: parsed.source,
        debt: BraceDebt::default(),
        diagnostics: Vec::new(),
    };

    preorder(parsed.root_node(), |node| {
        for position in BodyPosition::of(node) {
            pass.visit(position)?;
        }
        Ok(())
    })?;

    let mut output = PassOutput::new(pass.debt.flush(file)?);
    output.diagnostics = pass.diagnostics;
    debug!(
        file = %file.display(),
        edits = output.edits.len(),
        skipped = output.diagnostics.len(),
        "canonicalized"
    );
    Ok(output)
}

struct Canonicalizer<'a, 's> {
    file: &'a Path,
    source: &'s str,
    debt: BraceDebt<'s>,
    diagnostics: Vec<SiteDiagnostic>,
}

impl<'s> Canonicalizer<'_, 's> {
    fn visit(&mut self, position: BodyPosition<'_>) -> Result<(), EngineError> {
        match position {
            BodyPosition::ConditionalBranch { body, .. } | BodyPosition::LoopBody { body, .. } => {
                if is_block(body) {
                    return Ok(());
                }
                if let Some(reason) = unsafe_body(&[body]) {
                    self.skip(body, reason);
                    return Ok(());
                }
                if is_null_statement(body) {
                    let token = first_token(body);
                    self.debt.entry(token, self.source)?.null_body = true;
                    return Ok(());
                }
                self.wrap(first_token(body), last_token(body))
            }
            BodyPosition::SwitchCaseBody { label, run } => match run {
                CaseRun::Block(_) | CaseRun::GroupMember => Ok(()),
                CaseRun::Unanchored => {
                    self.skip(label, SkipReason::UnanchoredLabel);
                    Ok(())
                }
                CaseRun::EmptyTrailing { colon } => {
                    if label.has_error() {
                        self.skip(label, SkipReason::SyntaxError);
                        return Ok(());
                    }
                    self.debt.entry(colon, self.source)?.trailing_block = true;
                    Ok(())
                }
                CaseRun::Statements(statements) => {
                    if let Some(reason) = unsafe_body(&statements) {
                        self.skip(label, reason);
                        return Ok(());
                    }
                    if declares_into_later_labels(label, &statements) {
                        self.skip(label, SkipReason::ScopedDeclaration);
                        return Ok(());
                    }
                    match (statements.first(), statements.last()) {
                        (Some(first), Some(last)) => self.wrap(first_token(*first), last_token(*last)),
                        _ => Ok(()),
                    }
                }
            },
        }
    }

    fn wrap(&mut self, first: Node<'_>, last: Node<'_>) -> Result<(), EngineError> {
        self.debt.entry(first, self.source)?.open += 1;
        self.debt.entry(last, self.source)?.close += 1;
        Ok(())
    }

    fn skip(&mut self, node: Node<'_>, reason: SkipReason) {
        let diagnostic = SiteDiagnostic::at(node, reason);
        warn!(
            file = %self.file.display(),
            line = diagnostic.line,
            column = diagnostic.column,
            %reason,
            "skipping body"
        );
        self.diagnostics.push(diagnostic);
    }
}

/// Why a run of statements cannot be rewritten, if it cannot.
///
/// Directives inside a nested block leave the run's first and last tokens in
/// place, so only directives outside nested blocks count.
fn unsafe_body(statements: &[Node<'_>]) -> Option<SkipReason> {
    if statements.iter().any(|stmt| stmt.has_error()) {
        return Some(SkipReason::SyntaxError);
    }
    let preprocessed = statements.iter().any(|stmt| {
        any_descendant(
            *stmt,
            |node| node.kind().starts_with("preproc_"),
            is_block,
        )
    });
    preprocessed.then_some(SkipReason::PreprocessorDirective)
}

fn declares_into_later_labels(label: Node<'_>, statements: &[Node<'_>]) -> bool {
    if !statements.iter().any(|stmt| stmt.kind() == "declaration") {
        return false;
    }
    let mut next = label.next_named_sibling();
    while let Some(sibling) = next {
        if sibling.kind() == "case_statement" {
            return true;
        }
        next = sibling.next_named_sibling();
    }
    false
}

/// Pending rewrite of a single token.
#[derive(Debug)]
struct TokenRewrite<'s> {
    token: &'s str,
    open: usize,
    null_body: bool,
    trailing_block: bool,
    close: usize,
}

impl TokenRewrite<'_> {
    fn render(&self) -> String {
        let mut text = "{".repeat(self.open);
        if self.null_body {
            text.push_str("{}");
        } else {
            text.push_str(self.token);
        }
        if self.trailing_block {
            text.push_str("{}");
        }
        text.push_str(&"}".repeat(self.close));
        text
    }
}

/// Braces owed per token, flushed exactly once per token.
#[derive(Debug, Default)]
struct BraceDebt<'s> {
    tokens: BTreeMap<SourceSpan, TokenRewrite<'s>>,
}

impl<'s> BraceDebt<'s> {
    fn entry(
        &mut self,
        token: Node<'_>,
        source: &'s str,
    ) -> Result<&mut TokenRewrite<'s>, EngineError> {
        let text = node_text(token, source)?;
        Ok(self
            .tokens
            .entry(SourceSpan::of(token))
            .or_insert_with(|| TokenRewrite {
                token: text,
                open: 0,
                null_body: false,
                trailing_block: false,
                close: 0,
            }))
    }

    fn flush(self, file: &Path) -> Result<EditSet, EngineError> {
        let mut edits = EditSet::new(file);
        for (span, rewrite) in self.tokens {
            edits.replace(span, rewrite.render(), rewrite.token)?;
        }
        Ok(edits)
    }
}
