use std::result;
use thiserror::Error;

/// Location of a syntax error inside the source text, as a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOffset(pub usize);

#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error at byte {}: {message}", offset.0)]
    Parse {
        message: String,
        offset: SourceOffset,
    },
    #[error("Regeneration error: {0}")]
    Regeneration(String),
    #[error("Compile error: {0}")]
    Compile(String),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Error::Parse {
            message: message.into(),
            offset: SourceOffset(offset),
        }
    }

    pub fn regeneration(message: impl Into<String>) -> Self {
        Error::Regeneration(message.into())
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Error::Compile(message.into())
    }

    /// Short machine-friendly name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "parse",
            Error::Regeneration(_) => "regeneration",
            Error::Compile(_) => "compile",
            Error::Generic(_) => "generic",
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}
