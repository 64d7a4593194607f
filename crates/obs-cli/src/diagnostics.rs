//! Diagnostic and error reporting utilities

use crate::{CliError, Result};
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// Error tied to a location in an input file
#[derive(Error, Debug, Diagnostic)]
pub enum SourceDiagnostic {
    #[error("Syntax error: {message}")]
    #[diagnostic(
        code(obscura::syntax_error),
        help("The staged transforms only accept source that parses as Python 3")
    )]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        err_span: SourceSpan,
    },

    #[error("Invalid program structure: {message}")]
    #[diagnostic(
        code(obscura::structure_error),
        help("The bytecode serializer rejects programs the runtime would refuse to compile")
    )]
    Structure { message: String },
}

impl SourceDiagnostic {
    pub fn code_name(&self) -> &'static str {
        match self {
            SourceDiagnostic::Syntax { .. } => "syntax",
            SourceDiagnostic::Structure { .. } => "structure",
        }
    }
}

/// Syntax error pointing at `offset` inside `src`
pub fn syntax_error(name: &str, src: &str, offset: usize, message: String) -> SourceDiagnostic {
    let start = offset.min(src.len());
    let len = usize::from(start < src.len());
    SourceDiagnostic::Syntax {
        message,
        src: NamedSource::new(name, src.to_string()),
        err_span: (start, len).into(),
    }
}

pub fn structure_error(message: String) -> SourceDiagnostic {
    SourceDiagnostic::Structure { message }
}

/// Renders source-located errors through miette. Returns false when `error`
/// carries no source and should be logged instead.
pub fn render_cli_error(error: &CliError) -> bool {
    let CliError::Diagnostic(diagnostic) = error else {
        return false;
    };
    let mut out = String::new();
    let handler = GraphicalReportHandler::new();
    if handler.render_report(&mut out, diagnostic.as_ref()).is_err() {
        return false;
    }
    eprintln!("{}", out);
    true
}
