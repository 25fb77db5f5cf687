//! The rewriting passes.
//!
//! Each pass walks one parsed translation unit and produces an [`EditSet`]
//! for it; nothing here touches the source buffer or the filesystem. Sites
//! that cannot be rewritten coherently are skipped and reported as
//! [`SiteDiagnostic`]s instead of failing the unit.

pub mod body;
pub mod canonicalize;
pub mod globals;
pub mod instrument;

use crate::ledger::{EditSet, LedgerError};
use crate::ts::span::line_column;
use crate::ts::{SourceSpan, TreeSitterError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tree_sitter::Node;

pub use body::{BodyKind, BodyPosition, BracelessSwitch, CaseRun, ConstructKind};
pub use canonicalize::canonicalize;
pub use globals::make_static;
pub use instrument::{instrument, MarkerRegistry, ProbeKind, ProbeSite};

#[derive(Error, Debug)]
pub enum EngineError {
    /// The tree points at bytes the source buffer cannot provide.
    #[error("cannot read source text at {span}: syntax tree does not match the source")]
    UnreadableLocation { span: SourceSpan },

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Why a site was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The body contains an ERROR or MISSING node.
    SyntaxError,
    /// The body contains a preprocessor directive, so its extent depends on
    /// configuration the tree cannot see.
    PreprocessorDirective,
    /// The case run declares a variable that later labels can still see.
    ScopedDeclaration,
    /// An empty label is followed by something other than another label.
    UnanchoredLabel,
    /// Instrumentation found a body that is not a block.
    NotABlock,
    /// A fall-through probe would not land in a statement list.
    NotInStatementList,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::SyntaxError => "body contains a syntax error",
            SkipReason::PreprocessorDirective => "body contains a preprocessor directive",
            SkipReason::ScopedDeclaration => "case body declares a variable used past its label",
            SkipReason::UnanchoredLabel => "empty label is not followed by another label",
            SkipReason::NotABlock => "body is not a block; canonicalize first",
            SkipReason::NotInStatementList => "construct is not in a statement list",
        };
        f.write_str(text)
    }
}

/// A recoverable, per-site skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDiagnostic {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
    pub reason: SkipReason,
}

impl SiteDiagnostic {
    pub(crate) fn at(node: Node<'_>, reason: SkipReason) -> Self {
        let (line, column) = line_column(node);
        Self {
            line,
            column,
            byte: node.start_byte(),
            reason,
        }
    }
}

impl fmt::Display for SiteDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.reason)
    }
}

/// Result of running one pass over one translation unit.
#[derive(Debug)]
pub struct PassOutput {
    pub edits: EditSet,
    pub diagnostics: Vec<SiteDiagnostic>,
    /// Probe sites in id order; empty for passes that place no probes.
    pub sites: Vec<ProbeSite>,
}

impl PassOutput {
    pub(crate) fn new(edits: EditSet) -> Self {
        Self {
            edits,
            diagnostics: Vec::new(),
            sites: Vec::new(),
        }
    }
}

/// Text of `node`, or [`EngineError::UnreadableLocation`].
pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> Result<&'s str, EngineError> {
    let span = SourceSpan::of(node);
    span.text(source)
        .ok_or(EngineError::UnreadableLocation { span })
}

/// Visit every node of the tree in source-order pre-order.
pub(crate) fn preorder<'t>(
    root: Node<'t>,
    mut visit: impl FnMut(Node<'t>) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        visit(node)?;
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    Ok(())
}
