//! Syntax validation of rewritten sources.
//!
//! Every pass inserts text, so byte offsets of pre-existing errors shift and
//! cannot be compared positionally. A rewrite is accepted when re-parsing it
//! yields no more ERROR/MISSING nodes than the input had.

use crate::ts::{CParser, ParsedSource, SourceLang, TreeSitterError};
use thiserror::Error;

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("parse errors introduced: {count} ERROR/MISSING nodes after rewriting, {before} before")]
    ParseErrorIntroduced {
        count: usize,
        before: usize,
        errors: Vec<ErrorLocation>,
    },

    #[error("Tree-sitter error: {0}")]
    TreeSitter(#[from] TreeSitterError),
}

/// Location of an error node in the source.
#[derive(Debug, Clone)]
pub struct ErrorLocation {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
}

/// Parse validator using tree-sitter.
pub struct ParseValidator {
    parser: CParser,
}

impl ParseValidator {
    pub fn new(lang: SourceLang) -> Result<Self, TreeSitterError> {
        Ok(Self {
            parser: CParser::new(lang)?,
        })
    }

    /// Validate that source has no parse errors.
    pub fn validate(&mut self, source: &str) -> Result<(), ValidationError> {
        let parsed = self.parser.parse_with_source(source)?;
        check_clean(&parsed)
    }

    /// Check that `edited` has no more parse errors than `original`.
    pub fn validate_edit(&mut self, original: &str, edited: &str) -> Result<(), ValidationError> {
        let original_parsed = self.parser.parse_with_source(original)?;
        let edited_parsed = self.parser.parse_with_source(edited)?;
        compare(&original_parsed, &edited_parsed)
    }
}

/// Validation through the thread-local parser pool.
pub mod pooled {
    use super::*;
    use crate::pool;

    pub fn validate(lang: SourceLang, source: &str) -> Result<(), ValidationError> {
        pool::with_parser(lang, |parser| {
            let parsed = parser.parse_with_source(source)?;
            check_clean(&parsed)
        })?
    }

    pub fn validate_edit(lang: SourceLang, original: &str, edited: &str) -> Result<(), ValidationError> {
        pool::with_parser(lang, |parser| {
            let original_parsed = parser.parse_with_source(original)?;
            let edited_parsed = parser.parse_with_source(edited)?;
            compare(&original_parsed, &edited_parsed)
        })?
    }
}

fn check_clean(parsed: &ParsedSource<'_>) -> Result<(), ValidationError> {
    let errors = collect_errors(parsed);
    if errors.is_empty() {
        return Ok(());
    }
    Err(ValidationError::ParseErrorIntroduced {
        count: errors.len(),
        before: 0,
        errors,
    })
}

fn compare(original: &ParsedSource<'_>, edited: &ParsedSource<'_>) -> Result<(), ValidationError> {
    if !edited.has_errors() {
        return Ok(());
    }
    let before = original.error_nodes().len();
    let errors = collect_errors(edited);
    if errors.len() <= before {
        return Ok(());
    }
    Err(ValidationError::ParseErrorIntroduced {
        count: errors.len(),
        before,
        errors,
    })
}

fn collect_errors(parsed: &ParsedSource<'_>) -> Vec<ErrorLocation> {
    let source = parsed.source;
    parsed
        .error_nodes()
        .into_iter()
        .map(|node| {
            // Up to 20 bytes of context either side
            let context_start = floor_char_boundary(source, node.byte_start.saturating_sub(20));
            let context_end = floor_char_boundary(source, (node.byte_end + 20).min(source.len()));
            let context = source
                .get(context_start..context_end)
                .unwrap_or("")
                .to_string();
            ErrorLocation {
                byte_start: node.byte_start,
                byte_end: node.byte_end,
                line: node.start_point.row + 1,
                column: node.start_point.column + 1,
                context,
            }
        })
        .collect()
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
