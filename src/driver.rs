//! Runs the passes over a set of translation units and writes the results.
//!
//! Passes run one at a time over all units: canonicalize, then make-static,
//! then instrument, each over the previous pass's output. Within a pass the
//! units are processed in parallel. Their edit sets are merged per file, so
//! a file reached by several units must get the same edits from each. A
//! file that fails at any stage is dropped from later passes and left
//! untouched on disk; other files carry on.

use crate::config::{Passes, ToolConfig};
use crate::edit::{read_source, EditError};
use crate::engine::{
    canonicalize, instrument, make_static, EngineError, PassOutput, ProbeSite, SiteDiagnostic,
};
use crate::ledger::{EditLedger, LedgerError};
use crate::markers::DEFAULT_PREFIX;
use crate::pool;
use crate::ts::SourceLang;
use crate::validate::{pooled, ValidationError};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One rewriting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Canonicalize,
    MakeStatic,
    Instrument,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::Canonicalize => "canonicalize",
            Pass::MakeStatic => "make-static",
            Pass::Instrument => "instrument",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("cannot tell whether {} is C or C++", path.display())]
    UnknownLanguage { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: EditError },

    #[error("{pass} failed: {source}")]
    Engine { pass: Pass, source: EngineError },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("rewritten {} no longer parses: {source}", path.display())]
    Syntax {
        path: PathBuf,
        source: ValidationError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: LedgerError },
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub passes: Passes,
    pub prefix: String,
    pub language: Option<SourceLang>,
    pub verify_syntax: bool,
    /// Compute everything but leave files untouched.
    pub dry_run: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            passes: Passes::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            language: None,
            verify_syntax: true,
            dry_run: false,
        }
    }
}

impl From<&ToolConfig> for Pipeline {
    fn from(config: &ToolConfig) -> Self {
        Self {
            passes: config.passes,
            prefix: config.marker_prefix.clone(),
            language: config.language,
            verify_syntax: config.verify_syntax,
            dry_run: false,
        }
    }
}

impl Pipeline {
    /// Enabled passes in execution order.
    pub fn passes(&self) -> Vec<Pass> {
        let mut passes = Vec::with_capacity(3);
        if self.passes.canonicalize {
            passes.push(Pass::Canonicalize);
        }
        if self.passes.make_static {
            passes.push(Pass::MakeStatic);
        }
        if self.passes.instrument {
            passes.push(Pass::Instrument);
        }
        passes
    }

    fn language_of(&self, path: &Path) -> Result<SourceLang, DriverError> {
        self.language
            .or_else(|| SourceLang::from_path(path))
            .ok_or_else(|| DriverError::UnknownLanguage {
                path: path.to_path_buf(),
            })
    }
}

/// Outcome for one file that went through every pass.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub lang: SourceLang,
    pub original: String,
    pub rewritten: String,
    pub diagnostics: Vec<SiteDiagnostic>,
    /// Probe sites of the last instrumentation pass, in id order.
    pub sites: Vec<ProbeSite>,
}

impl FileReport {
    pub fn changed(&self) -> bool {
        self.original != self.rewritten
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: DriverError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run one pass over one parsed unit.
fn run_pass(
    pass: Pass,
    path: &Path,
    lang: SourceLang,
    source: &str,
    prefix: &str,
) -> Result<PassOutput, DriverError> {
    let result = pool::with_parser(lang, |parser| {
        let parsed = parser.parse_with_source(source)?;
        match pass {
            Pass::Canonicalize => canonicalize(path, &parsed),
            Pass::MakeStatic => make_static(path, &parsed),
            Pass::Instrument => instrument(path, &parsed, prefix),
        }
    })
    .map_err(EngineError::from)
    .and_then(|inner| inner);
    result.map_err(|source| DriverError::Engine { pass, source })
}

/// Run the pipeline over a single in-memory translation unit.
///
/// Nothing is read from or written to disk; `path` only labels edits and
/// diagnostics.
pub fn transform_source(
    path: &Path,
    source: &str,
    lang: SourceLang,
    pipeline: &Pipeline,
) -> Result<FileReport, DriverError> {
    let mut report = FileReport {
        path: path.to_path_buf(),
        lang,
        original: source.to_string(),
        rewritten: source.to_string(),
        diagnostics: Vec::new(),
        sites: Vec::new(),
    };

    for pass in pipeline.passes() {
        let output = run_pass(pass, path, lang, &report.rewritten, &pipeline.prefix)?;
        report.rewritten = output.edits.apply_to(&report.rewritten)?;
        report.diagnostics.extend(output.diagnostics);
        if pass == Pass::Instrument {
            report.sites = output.sites;
        }
    }

    if pipeline.verify_syntax {
        verify(&report)?;
    }
    Ok(report)
}

fn verify(report: &FileReport) -> Result<(), DriverError> {
    pooled::validate_edit(report.lang, &report.original, &report.rewritten).map_err(|source| {
        DriverError::Syntax {
            path: report.path.clone(),
            source,
        }
    })
}

/// Run the pipeline over `units`, one translation unit per path.
///
/// Every unit only rewrites its own file. A path listed more than once is
/// loaded and rewritten once, and its repeated edit sets are identical, so
/// the ledger merge here never reports [`LedgerError::UnitConflict`]. Headers
/// shared through `#include` are not followed.
pub fn run(units: &[PathBuf], pipeline: &Pipeline) -> RunReport {
    let mut report = RunReport::default();
    let mut files: BTreeMap<PathBuf, FileReport> = BTreeMap::new();

    for path in units {
        if files.contains_key(path) || report.failures.iter().any(|failure| &failure.path == path) {
            continue;
        }
        let loaded = pipeline.language_of(path).and_then(|lang| {
            let source = read_source(path).map_err(|source| DriverError::Read {
                path: path.clone(),
                source,
            })?;
            Ok((lang, source))
        });
        match loaded {
            Ok((lang, source)) => {
                files.insert(
                    path.clone(),
                    FileReport {
                        path: path.clone(),
                        lang,
                        original: source.clone(),
                        rewritten: source,
                        diagnostics: Vec::new(),
                        sites: Vec::new(),
                    },
                );
            }
            Err(error) => fail(&mut report, path, error),
        }
    }

    for pass in pipeline.passes() {
        let outputs: Vec<(&PathBuf, Result<PassOutput, DriverError>)> = units
            .par_iter()
            .filter_map(|path| files.get(path).map(|file| (path, file)))
            .map(|(path, file)| {
                let output = run_pass(pass, path, file.lang, &file.rewritten, &pipeline.prefix);
                (path, output)
            })
            .collect();

        let mut ledger = EditLedger::new();
        let mut failed: BTreeMap<PathBuf, DriverError> = BTreeMap::new();
        let mut seen = HashSet::new();
        for (path, output) in outputs {
            if failed.contains_key(path) {
                continue;
            }
            let merged = output.and_then(|output| {
                ledger.merge(output.edits)?;
                Ok((output.diagnostics, output.sites))
            });
            match merged {
                // Every unit reaching a file reports the same sites for it
                Ok((diagnostics, sites)) => {
                    if let Some(file) = files.get_mut(path) {
                        if seen.insert(path.clone()) {
                            file.diagnostics.extend(diagnostics);
                            if pass == Pass::Instrument {
                                file.sites = sites;
                            }
                        }
                    }
                }
                Err(error) => {
                    failed.insert(path.clone(), error);
                }
            }
        }

        for (path, file) in files.iter_mut() {
            if failed.contains_key(path) {
                continue;
            }
            match ledger.flush_source(path, &file.rewritten) {
                Ok(text) => file.rewritten = text,
                Err(error) => {
                    failed.insert(path.clone(), error.into());
                }
            }
        }

        debug!(%pass, files = files.len(), failed = failed.len(), "pass finished");
        for (path, error) in failed {
            files.remove(&path);
            fail(&mut report, &path, error);
        }
    }

    for (path, file) in files {
        if pipeline.verify_syntax {
            if let Err(error) = verify(&file) {
                fail(&mut report, &path, error);
                continue;
            }
        }
        if !pipeline.dry_run && file.changed() {
            if let Err(source) = EditLedger::commit(&path, &file.rewritten) {
                fail(&mut report, &path, DriverError::Write { path: path.clone(), source });
                continue;
            }
            info!(file = %path.display(), probes = file.sites.len(), "rewrote file");
        }
        report.files.push(file);
    }
    report
}

fn fail(report: &mut RunReport, path: &Path, error: DriverError) {
    warn!(file = %path.display(), %error, "leaving file unchanged");
    report.failures.push(FileFailure {
        path: path.to_path_buf(),
        error,
    });
}

/// Expand directories into the C and C++ sources below them.
///
/// Files given explicitly are kept whatever their extension; the language
/// check happens when they are loaded.
pub fn discover(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        if !path.is_dir() {
            found.push(path.clone());
            continue;
        }
        let mut sources: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| SourceLang::from_path(path).is_some())
            .collect();
        sources.sort();
        found.extend(sources);
    }
    found
}
