use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tree_sitter::{Parser, Tree};

/// Source language of a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLang {
    #[default]
    C,
    Cpp,
}

impl SourceLang {
    /// Parse a language name as written in configuration or on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Some(SourceLang::C),
            "cpp" | "c++" | "cxx" => Some(SourceLang::Cpp),
            _ => None,
        }
    }

    /// Pick the language from a file extension.
    ///
    /// Headers (`.h`) are treated as C; anything unrecognized returns `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str())? {
            "c" | "h" | "i" => Some(SourceLang::C),
            "cc" | "cpp" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "ii" => Some(SourceLang::Cpp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceLang::C => "c",
            SourceLang::Cpp => "cpp",
        }
    }

    fn support_lang(self) -> SupportLang {
        match self {
            SourceLang::C => SupportLang::C,
            SourceLang::Cpp => SupportLang::Cpp,
        }
    }
}

impl fmt::Display for SourceLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tree-sitter parser wrapper for C and C++ source code.
pub struct CParser {
    parser: Parser,
    lang: SourceLang,
}

impl CParser {
    /// Create a new parser for the given language.
    pub fn new(lang: SourceLang) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        // Get the tree-sitter Language from ast-grep-language
        let ts_lang = lang.support_lang().get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet {
                language: lang.name(),
            })?;

        Ok(Self { parser, lang })
    }

    /// Get the configured language.
    pub fn lang(&self) -> SourceLang {
        self.lang
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource {
            source,
            tree,
            lang: self.lang,
        })
    }
}

/// A parsed translation unit with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
    pub lang: SourceLang,
}

impl<'a> ParsedSource<'a> {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Get all ERROR and MISSING nodes in the tree.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        let mut stack = vec![self.tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                errors.push(ErrorNode {
                    byte_start: node.start_byte(),
                    byte_end: node.end_byte(),
                    start_point: node.start_position(),
                });
            }
            if !node.has_error() {
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        errors
    }
}

/// Information about an ERROR or MISSING node in the parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub start_point: tree_sitter::Point,
}
