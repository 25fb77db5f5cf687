//! Classification of control-flow constructs and their body positions.
//!
//! A body position is a then/else branch, a loop body, or the statement run
//! governed by a case/default label. Both passes dispatch on
//! [`BodyPosition`], so they agree on what counts as a body.

use crate::ts::span::{next_statement_sibling, previous_statement_sibling};
use serde::Serialize;
use std::fmt;
use tree_sitter::Node;

/// Construct owning a body position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    If,
    While,
    DoWhile,
    For,
    RangeFor,
    Switch,
    Case,
}

impl ConstructKind {
    pub fn of(node: Node<'_>) -> Option<Self> {
        let kind = match node.kind() {
            "if_statement" => ConstructKind::If,
            "while_statement" => ConstructKind::While,
            "do_statement" => ConstructKind::DoWhile,
            "for_statement" => ConstructKind::For,
            "for_range_loop" => ConstructKind::RangeFor,
            "switch_statement" => ConstructKind::Switch,
            "case_statement" => ConstructKind::Case,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether control can leave the construct by falling off its end.
    pub fn falls_through(self) -> bool {
        !matches!(self, ConstructKind::Case)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConstructKind::If => "if",
            ConstructKind::While => "while",
            ConstructKind::DoWhile => "do-while",
            ConstructKind::For => "for",
            ConstructKind::RangeFor => "range-for",
            ConstructKind::Switch => "switch",
            ConstructKind::Case => "case",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which body of its construct a position is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Then,
    Else,
    Loop,
    Case,
}

/// The statements governed by one case/default label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseRun<'t> {
    /// A single block statement.
    Block(Node<'t>),
    /// One or more statements that are not (only) a block.
    Statements(Vec<Node<'t>>),
    /// No statements and another label follows: the group's body is anchored
    /// at a later label.
    GroupMember,
    /// No statements and nothing follows before the end of the switch.
    EmptyTrailing { colon: Node<'t> },
    /// No statements, followed by something that is not a label.
    Unanchored,
}

impl<'t> CaseRun<'t> {
    /// Split the children of a `case_statement` into its run.
    pub fn of(label: Node<'t>) -> Self {
        let mut cursor = label.walk();
        let mut colon = None;
        let mut statements = Vec::new();
        for child in label.children(&mut cursor) {
            if colon.is_none() {
                if child.kind() == ":" {
                    colon = Some(child);
                }
                continue;
            }
            if child.is_named() && !child.is_extra() {
                statements.push(child);
            }
        }
        // The grammar lets a label take every statement up to the end of the
        // enclosing block, but a switch without braces governs only one.
        if in_braceless_switch(label) {
            statements.truncate(1);
        }

        match statements.as_slice() {
            [only] if only.kind() == "compound_statement" => CaseRun::Block(*only),
            [] => match next_statement_sibling(label) {
                Some(next) if next.kind() == "case_statement" => CaseRun::GroupMember,
                Some(_) => CaseRun::Unanchored,
                None => match colon {
                    Some(colon) => CaseRun::EmptyTrailing { colon },
                    None => CaseRun::Unanchored,
                },
            },
            _ => CaseRun::Statements(statements),
        }
    }
}

/// A `switch` written without braces, seen from its first label.
///
/// The grammar has no such switch, so there is no node spanning it: it ends
/// with the single statement it governs, not where the parse says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracelessSwitch<'t> {
    /// The node whose parent decides whether the switch sits in a statement list.
    pub anchor: Node<'t>,
    /// The statement the switch governs.
    pub governed: Node<'t>,
}

impl<'t> BracelessSwitch<'t> {
    /// The switch headed by `label`, if `label` is the first label of a
    /// switch without braces.
    pub fn headed_by(label: Node<'t>) -> Option<Self> {
        if label.kind() != "case_statement" || !in_braceless_switch(label) {
            return None;
        }
        if previous_statement_sibling(label).is_some_and(|node| node.kind() == "case_statement") {
            return None;
        }

        let anchor = match label.parent() {
            Some(parent) if parent.kind() == "switch_statement" => parent,
            Some(parent) if opens_without_brace(parent) => parent
                .parent()
                .filter(|switch| switch.kind() == "switch_statement")
                .unwrap_or(label),
            _ => label,
        };

        let mut current = label;
        loop {
            match CaseRun::of(current) {
                CaseRun::Block(block) => return Some(Self { anchor, governed: block }),
                CaseRun::Statements(statements) => {
                    return statements.first().map(|&governed| Self { anchor, governed })
                }
                CaseRun::GroupMember => current = next_statement_sibling(current)?,
                CaseRun::EmptyTrailing { .. } | CaseRun::Unanchored => return None,
            }
        }
    }
}

/// Whether `switch` has a `{ … }` body in the source text.
pub fn has_braced_body(switch: Node<'_>) -> bool {
    switch
        .child_by_field_name("body")
        .is_some_and(|body| is_block(body) && !opens_without_brace(body))
}

fn opens_without_brace(block: Node<'_>) -> bool {
    is_block(block) && block.child(0).map_or(true, |brace| brace.is_missing())
}

/// Whether `label` belongs to a `switch` written without braces.
///
/// Such a label ends up either in a block whose `{` is missing, directly
/// under the switch, or right after an unparsed `switch (…)` header.
fn in_braceless_switch(label: Node<'_>) -> bool {
    let Some(parent) = label.parent() else {
        return false;
    };
    if parent.kind() == "switch_statement" {
        return true;
    }
    if opens_without_brace(parent) {
        return parent
            .parent()
            .is_some_and(|switch| switch.kind() == "switch_statement");
    }
    if !is_block(parent) {
        return false;
    }

    let mut previous = previous_statement_sibling(label);
    while let Some(node) = previous {
        if node.kind() != "case_statement" {
            return is_switch_header(node);
        }
        previous = previous_statement_sibling(node);
    }
    false
}

fn is_switch_header(node: Node<'_>) -> bool {
    match node.kind() {
        "switch_statement" => !has_braced_body(node),
        "ERROR" => {
            let mut cursor = node.walk();
            let found = node.children(&mut cursor).any(|child| child.kind() == "switch");
            found
        }
        _ => false,
    }
}

/// A body position, tagged by the construct that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPosition<'t> {
    ConditionalBranch {
        construct: Node<'t>,
        branch: BodyKind,
        body: Node<'t>,
    },
    LoopBody {
        construct: Node<'t>,
        kind: ConstructKind,
        body: Node<'t>,
    },
    SwitchCaseBody {
        label: Node<'t>,
        run: CaseRun<'t>,
    },
}

impl<'t> BodyPosition<'t> {
    /// The body positions `node` owns directly, in source order.
    pub fn of(node: Node<'t>) -> Vec<Self> {
        let Some(kind) = ConstructKind::of(node) else {
            return Vec::new();
        };

        match kind {
            ConstructKind::If => {
                let mut positions = Vec::with_capacity(2);
                if let Some(body) = node.child_by_field_name("consequence") {
                    positions.push(BodyPosition::ConditionalBranch {
                        construct: node,
                        branch: BodyKind::Then,
                        body,
                    });
                }
                if let Some(body) = node.child_by_field_name("alternative").and_then(else_body) {
                    positions.push(BodyPosition::ConditionalBranch {
                        construct: node,
                        branch: BodyKind::Else,
                        body,
                    });
                }
                positions
            }
            ConstructKind::Switch => Vec::new(),
            ConstructKind::Case => vec![BodyPosition::SwitchCaseBody {
                label: node,
                run: CaseRun::of(node),
            }],
            loop_kind => node
                .child_by_field_name("body")
                .map(|body| BodyPosition::LoopBody {
                    construct: node,
                    kind: loop_kind,
                    body,
                })
                .into_iter()
                .collect(),
        }
    }

    pub fn body_kind(&self) -> BodyKind {
        match self {
            BodyPosition::ConditionalBranch { branch, .. } => *branch,
            BodyPosition::LoopBody { .. } => BodyKind::Loop,
            BodyPosition::SwitchCaseBody { .. } => BodyKind::Case,
        }
    }

    pub fn construct_kind(&self) -> ConstructKind {
        match self {
            BodyPosition::ConditionalBranch { .. } => ConstructKind::If,
            BodyPosition::LoopBody { kind, .. } => *kind,
            BodyPosition::SwitchCaseBody { .. } => ConstructKind::Case,
        }
    }
}

// Grammar versions differ on whether `alternative` is the else clause or the
// statement after `else`.
fn else_body(alternative: Node<'_>) -> Option<Node<'_>> {
    if alternative.kind() != "else_clause" {
        return Some(alternative);
    }
    let mut cursor = alternative.walk();
    let children: Vec<_> = alternative.named_children(&mut cursor).collect();
    children.into_iter().rev().find(|child| !child.is_extra())
}

/// Whether `node` is a block statement.
pub fn is_block(node: Node<'_>) -> bool {
    node.kind() == "compound_statement"
}

/// Whether `node` is a bare `;`.
pub fn is_null_statement(node: Node<'_>) -> bool {
    if node.kind() != "expression_statement" {
        return false;
    }
    let mut cursor = node.walk();
    let mut tokens = node.children(&mut cursor).filter(|child| !child.is_extra());
    matches!((tokens.next(), tokens.next()), (Some(only), None) if only.kind() == ";")
}
