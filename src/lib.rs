//! dce-probe: block canonicalization and dead-code probes for C and C++
//!
//! Rewrites translation units so that the assembly a compiler produces for
//! them shows which blocks it proved dead. Every control-flow body is first
//! turned into an explicit block; each block then gets a call to a unique,
//! never-defined probe function, and so does the code right after any
//! construct that can return early. A probe call that disappears from the
//! assembly marks a block the compiler eliminated.
//!
//! # Architecture
//!
//! All rewriting compiles down to a single primitive: [`Edit`], a verified
//! byte-span replacement. The passes in [`engine`] only read the tree-sitter
//! syntax tree and produce an [`EditSet`] per file; the [`ledger`] checks
//! those for overlaps and materializes them all-or-nothing; the [`driver`]
//! sequences passes over many files and writes results atomically.
//!
//! # Example
//!
//! ```no_run
//! use dce_probe::driver::{transform_source, Pipeline};
//! use dce_probe::ts::SourceLang;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = "int f(int a) { if (a > 0) a = 1; else a = 0; return a; }\n";
//! let report = transform_source(Path::new("f.c"), source, SourceLang::C, &Pipeline::default())?;
//! println!("{}", report.rewritten);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod edit;
pub mod engine;
pub mod ledger;
pub mod markers;
pub mod pool;
pub mod ts;
pub mod validate;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, Passes, ToolConfig};
pub use driver::{run, transform_source, DriverError, Pass, Pipeline, RunReport};
pub use edit::{Edit, EditError, EditVerification};
pub use engine::{
    canonicalize, instrument, make_static, EngineError, PassOutput, ProbeKind, ProbeSite,
    SiteDiagnostic, SkipReason,
};
pub use ledger::{EditLedger, EditSet, LedgerError};
pub use ts::{CParser, SourceLang, SourceSpan, TreeSitterError};
pub use validate::{ErrorLocation, ParseValidator, ValidationError};
