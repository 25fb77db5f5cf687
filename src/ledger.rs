//! Edit ledger: collects, validates and materializes per-file edit sets.
//!
//! # Rules
//!
//! 1. Edits are ordered by `(byte_start, byte_end)`; ties keep recording order.
//! 2. Zero-width insertions sharing an anchor are concatenated in that order.
//! 3. Any other overlap is a [`LedgerError::Conflict`] and nothing is written.
//! 4. Identical edits collapse to one.

use crate::edit::{atomic_write, read_source, Edit, EditError};
use crate::ts::SourceSpan;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("conflicting edits in {file}: {first} overlaps {second}")]
    Conflict {
        file: PathBuf,
        first: SourceSpan,
        second: SourceSpan,
    },

    #[error("translation units disagree on edits to {file} at {span}: {existing:?} vs {incoming:?}")]
    UnitConflict {
        file: PathBuf,
        span: SourceSpan,
        existing: Vec<String>,
        incoming: Vec<String>,
    },

    #[error("edit for {found} recorded in the edit set of {expected}")]
    ForeignFile { expected: PathBuf, found: PathBuf },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Pending edits for a single file.
#[derive(Debug, Clone)]
pub struct EditSet {
    file: PathBuf,
    edits: Vec<Edit>,
    seen: HashSet<(usize, usize, String)>,
}

impl EditSet {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            edits: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Add one pending edit. Re-recording an identical edit is a no-op.
    pub fn record(&mut self, edit: Edit) -> Result<(), LedgerError> {
        if edit.file != self.file {
            return Err(LedgerError::ForeignFile {
                expected: self.file.clone(),
                found: edit.file,
            });
        }
        let key = (edit.byte_start, edit.byte_end, edit.new_text.clone());
        if self.seen.insert(key) {
            self.edits.push(edit);
        }
        Ok(())
    }

    /// Record a zero-width insertion.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) -> Result<(), LedgerError> {
        let edit = Edit::insert(self.file.clone(), offset, text);
        self.record(edit)
    }

    /// Record a replacement of `span`, whose current text is `expected_before`.
    pub fn replace(
        &mut self,
        span: SourceSpan,
        text: impl Into<String>,
        expected_before: &str,
    ) -> Result<(), LedgerError> {
        let edit = Edit::replace(self.file.clone(), span, text, expected_before);
        self.record(edit)
    }

    /// Edits in application order, or the first conflicting pair.
    pub fn ordered(&self) -> Result<Vec<&Edit>, LedgerError> {
        let mut ordered: Vec<&Edit> = self.edits.iter().collect();
        // Stable sort keeps recording order for insertions sharing an anchor
        ordered.sort_by_key(|edit| (edit.byte_start, edit.byte_end));

        let mut widest: Option<&Edit> = None;
        for edit in ordered.iter().copied() {
            if let Some(prev) = widest {
                if edit.byte_start < prev.byte_end {
                    return Err(LedgerError::Conflict {
                        file: self.file.clone(),
                        first: prev.span(),
                        second: edit.span(),
                    });
                }
            }
            match widest {
                Some(prev) if prev.byte_end > edit.byte_end => {}
                _ => widest = Some(edit),
            }
        }

        Ok(ordered)
    }

    /// Materialize the edits against `source`.
    ///
    /// All-or-nothing: every edit is validated before any text is produced.
    pub fn apply_to(&self, source: &str) -> Result<String, LedgerError> {
        let ordered = self.ordered()?;
        for edit in &ordered {
            edit.validate(source)?;
        }

        let inserted: usize = ordered.iter().map(|edit| edit.new_text.len()).sum();
        let mut output = String::with_capacity(source.len() + inserted);
        let mut cursor = 0;
        for edit in ordered {
            output.push_str(&source[cursor..edit.byte_start]);
            output.push_str(&edit.new_text);
            cursor = edit.byte_end;
        }
        output.push_str(&source[cursor..]);
        Ok(output)
    }

    fn groups(&self) -> BTreeMap<(usize, usize), Vec<String>> {
        let mut groups: BTreeMap<(usize, usize), Vec<String>> = BTreeMap::new();
        for edit in &self.edits {
            groups
                .entry((edit.byte_start, edit.byte_end))
                .or_default()
                .push(edit.new_text.clone());
        }
        groups
    }
}

/// Edit sets for every file touched by a pass.
#[derive(Debug, Default)]
pub struct EditLedger {
    sets: BTreeMap<PathBuf, EditSet>,
}

impl EditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pending edit to its file's set.
    pub fn record(&mut self, edit: Edit) -> Result<(), LedgerError> {
        self.sets
            .entry(edit.file.clone())
            .or_insert_with(|| EditSet::new(edit.file.clone()))
            .record(edit)
    }

    /// Union an edit set produced by another translation unit.
    ///
    /// A file shared by several units must receive the same edits from each of
    /// them; edits to the same span with different text cannot be reconciled.
    pub fn merge(&mut self, incoming: EditSet) -> Result<(), LedgerError> {
        let Some(existing) = self.sets.get_mut(&incoming.file) else {
            self.sets.insert(incoming.file.clone(), incoming);
            return Ok(());
        };

        let existing_groups = existing.groups();
        let incoming_groups = incoming.groups();
        for ((start, end), texts) in &incoming_groups {
            if let Some(current) = existing_groups.get(&(*start, *end)) {
                if current != texts {
                    return Err(LedgerError::UnitConflict {
                        file: incoming.file.clone(),
                        span: SourceSpan {
                            start: *start,
                            end: *end,
                        },
                        existing: current.clone(),
                        incoming: texts.clone(),
                    });
                }
            }
        }

        for edit in incoming.edits {
            if !existing_groups.contains_key(&(edit.byte_start, edit.byte_end)) {
                existing.record(edit)?;
            }
        }
        Ok(())
    }

    /// Files with pending edits, in path order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.sets.keys().map(PathBuf::as_path)
    }

    pub fn edit_set(&self, file: &Path) -> Option<&EditSet> {
        self.sets.get(file)
    }

    /// Materialize and drop the pending edits of `file` against `source`.
    ///
    /// A file without pending edits is returned unchanged.
    pub fn flush_source(&mut self, file: &Path, source: &str) -> Result<String, LedgerError> {
        match self.sets.remove(file) {
            Some(set) => set.apply_to(source),
            None => Ok(source.to_string()),
        }
    }

    /// Like [`EditLedger::flush_source`], reading the snapshot from disk.
    pub fn flush(&mut self, file: &Path) -> Result<String, LedgerError> {
        let source = read_source(file)?;
        self.flush_source(file, &source)
    }

    /// Write flushed text back to `file` atomically.
    pub fn commit(file: &Path, text: &str) -> Result<(), LedgerError> {
        atomic_write(file, text.as_bytes())?;
        Ok(())
    }
}
