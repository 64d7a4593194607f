use crate::config::PipelineOptions;
use obs_core::diagnostics::{Diagnostic, DiagnosticManager};
use std::error::Error;
use std::fmt;

/// Diagnostics gathered over one pipeline run. Each stage's new items are
/// logged when the stage finishes; all of them stay available to the caller.
#[derive(Debug, Default, Clone)]
pub struct PipelineDiagnostics {
    pub items: Vec<Diagnostic>,
    emitted: usize,
}

impl PipelineDiagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn emit_stage(&mut self, stage: &'static str, options: &PipelineOptions) {
        if self.emitted == self.items.len() {
            return;
        }
        if options.verbose {
            DiagnosticManager::emit(&self.items[self.emitted..], Some(stage));
        }
        self.emitted = self.items.len();
    }

    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[derive(Debug)]
pub struct PipelineError {
    pub stage: &'static str,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

impl Error for PipelineError {}
