use crate::markers::{is_valid_prefix, DEFAULT_PREFIX};
use crate::ts::SourceLang;
use serde::Deserialize;
use std::fmt;

/// Settings shared by every command.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default = "default_prefix")]
    pub marker_prefix: String,
    /// Force a language instead of picking one per file extension.
    #[serde(default)]
    pub language: Option<SourceLang>,
    /// Reject rewrites that parse with more errors than their input.
    #[serde(default = "default_true")]
    pub verify_syntax: bool,
    #[serde(default)]
    pub passes: Passes,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            marker_prefix: default_prefix(),
            language: None,
            verify_syntax: true,
            passes: Passes::default(),
        }
    }
}

impl ToolConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.marker_prefix.trim().is_empty() {
            issues.push(ValidationIssue::EmptyPrefix);
        } else if !is_valid_prefix(&self.marker_prefix) {
            issues.push(ValidationIssue::InvalidPrefix {
                prefix: self.marker_prefix.clone(),
            });
        }

        if !self.passes.any() {
            issues.push(ValidationIssue::NoPassesEnabled);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Which passes run, in the fixed order canonicalize, make-static,
/// instrument.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Passes {
    #[serde(default = "default_true")]
    pub canonicalize: bool,
    #[serde(default)]
    pub make_static: bool,
    #[serde(default = "default_true")]
    pub instrument: bool,
}

impl Default for Passes {
    fn default() -> Self {
        Self {
            canonicalize: true,
            make_static: false,
            instrument: true,
        }
    }
}

impl Passes {
    pub fn only_canonicalize() -> Self {
        Self {
            canonicalize: true,
            make_static: false,
            instrument: false,
        }
    }

    pub fn only_make_static() -> Self {
        Self {
            canonicalize: false,
            make_static: true,
            instrument: false,
        }
    }

    pub fn any(&self) -> bool {
        self.canonicalize || self.make_static || self.instrument
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyPrefix,
    InvalidPrefix { prefix: String },
    NoPassesEnabled,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPrefix => write!(f, "marker_prefix must not be empty"),
            ValidationIssue::InvalidPrefix { prefix } => {
                write!(f, "marker_prefix '{prefix}' is not a valid C identifier")
            }
            ValidationIssue::NoPassesEnabled => write!(f, "no passes enabled"),
        }
    }
}
