use std::fmt::{Display, Formatter};

use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// A message produced while transforming a unit, optionally tagged with the
/// failure class it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub code: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            code: None,
            suggestions: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}[{}]: {}", self.level, code, self.message)?,
            None => write!(f, "{}: {}", self.level, self.message)?,
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  help: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Routes diagnostics into the tracing subscriber installed by the host.
pub struct DiagnosticManager;

impl DiagnosticManager {
    pub fn emit(diagnostics: &[Diagnostic], stage: Option<&str>) {
        let stage = stage.unwrap_or("obscura");
        for diagnostic in diagnostics {
            match diagnostic.level {
                DiagnosticLevel::Warning => warn!(stage, "{}", diagnostic),
                DiagnosticLevel::Error => error!(stage, "{}", diagnostic),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_code_and_suggestions() {
        let diag = Diagnostic::warning("stage skipped")
            .with_code("parse")
            .with_suggestion("run `obscura check` on the input");
        assert_eq!(
            diag.to_string(),
            "warning[parse]: stage skipped\n  help: run `obscura check` on the input"
        );
    }
}
