//! Obscura CLI library
//!
//! File handling, configuration and command implementations behind the
//! `obscura` binary. The transforms themselves live in `obs-pipeline`.

pub mod cli;
pub mod commands;
pub mod diagnostics;

pub mod error {
    use thiserror::Error;

    use crate::diagnostics::SourceDiagnostic;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Transform failed: {0}")]
        Transform(#[from] obs_pipeline::PipelineError),

        #[error("Encoding failed: {0}")]
        Encoding(#[from] obs_layers::LayerError),

        #[error("Decoding failed: {0}")]
        Decode(String),

        #[error("{0}")]
        Source(#[from] obs_core::Error),

        #[error("{0}")]
        Diagnostic(Box<SourceDiagnostic>),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
