//! Source spans and token-boundary lookup over tree-sitter nodes.
//!
//! tree-sitter leaves are the tokens of the grammar, so the first and last
//! leaf of a node give the token boundaries used to align edits. Comments are
//! extras and never count as a node's first or last token.

use std::fmt;
use std::ops::Range;
use tree_sitter::Node;

/// Half-open byte range within one file, taken from a syntax-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    /// Span covered by a node.
    pub fn of(node: Node<'_>) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Read the spanned text, or `None` if the span does not lie on character
    /// boundaries inside `source`.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.range())
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Leftmost token (leaf) of `node`, skipping comments.
pub fn first_token(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        let mut cursor = current.walk();
        let next = current.children(&mut cursor).find(|child| !child.is_extra());
        match next {
            Some(child) => current = child,
            None => return current,
        }
    }
}

/// Rightmost token (leaf) of `node`, skipping comments.
pub fn last_token(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        let mut cursor = current.walk();
        let children: Vec<_> = current.children(&mut cursor).collect();
        match children.into_iter().rev().find(|child| !child.is_extra()) {
            Some(child) => current = child,
            None => return current,
        }
    }
}

/// Next named sibling that is not a comment.
pub fn next_statement_sibling(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.next_named_sibling();
    while let Some(sibling) = current {
        if !sibling.is_extra() {
            return Some(sibling);
        }
        current = sibling.next_named_sibling();
    }
    None
}

/// Previous named sibling that is not a comment.
pub fn previous_statement_sibling(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.prev_named_sibling();
    while let Some(sibling) = current {
        if !sibling.is_extra() {
            return Some(sibling);
        }
        current = sibling.prev_named_sibling();
    }
    None
}

/// 1-based line and column where `node` starts.
pub fn line_column(node: Node<'_>) -> (usize, usize) {
    let point = node.start_position();
    (point.row + 1, point.column + 1)
}

/// Whether any node in the subtree (including `node`) satisfies `pred`,
/// without looking below nodes for which `prune` holds.
pub fn any_descendant(
    node: Node<'_>,
    mut pred: impl FnMut(Node<'_>) -> bool,
    mut prune: impl FnMut(Node<'_>) -> bool,
) -> bool {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if pred(current) {
            return true;
        }
        if prune(current) {
            continue;
        }
        let mut cursor = current.walk();
        stack.extend(current.children(&mut cursor));
    }
    false
}
