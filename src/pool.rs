//! Thread-local parser pooling.
//!
//! Translation units are processed in parallel on the rayon pool; each worker
//! thread keeps one parser per language and reuses it for every unit it
//! handles.

use crate::ts::{CParser, SourceLang, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static C_PARSER: RefCell<Option<CParser>> = const { RefCell::new(None) };
    static CPP_PARSER: RefCell<Option<CParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance for `lang`.
///
/// On first call per thread and language, creates a new parser. Subsequent
/// calls reuse the same instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use dce_probe::pool::with_parser;
/// use dce_probe::ts::SourceLang;
///
/// let has_errors = with_parser(SourceLang::C, |parser| {
///     parser.parse_with_source("int main(void) { return 0; }").map(|p| p.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(lang: SourceLang, f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut CParser) -> R,
{
    let slot = match lang {
        SourceLang::C => &C_PARSER,
        SourceLang::Cpp => &CPP_PARSER,
    };
    slot.with(|cell| {
        let mut opt = cell.borrow_mut();
        let parser = match &mut *opt {
            Some(parser) => parser,
            empty => empty.insert(CParser::new(lang)?),
        };
        Ok(f(parser))
    })
}
