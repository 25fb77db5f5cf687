use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set {language} language for parser")]
    LanguageSet { language: &'static str },

    #[error("failed to parse source code")]
    ParseFailed,
}
