//! Tree-sitter integration for C and C++ translation units.
//!
//! This module provides the read-only syntax tree the engine walks: parsing,
//! node spans, and token-boundary lookup, without losing comments or
//! formatting.

pub mod errors;
pub mod parser;
pub mod span;

pub use errors::TreeSitterError;
pub use parser::{CParser, ErrorNode, ParsedSource, SourceLang};
pub use span::{first_token, last_token, SourceSpan};
