use std::fmt::{Display, Formatter};

use obs_core::diagnostics::Diagnostic;
use obs_core::Level;

use crate::config::FallbackPolicy;

/// State threaded through the stages of one transform call.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub text: String,
    pub requested: Level,
    pub fallback: FallbackPolicy,
    pub reports: Vec<StageReport>,
}

impl TransformContext {
    pub fn new(source: &str, requested: Level, fallback: FallbackPolicy) -> Self {
        Self {
            text: source.to_string(),
            requested,
            fallback,
            reports: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The requested level does not unlock the stage.
    NotRequested,
    /// The stage ran and failed; its input was passed through.
    Failed {
        kind: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub level: Level,
    pub status: StageStatus,
}

impl Display for StageReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            StageStatus::Applied => write!(f, "{} (level {}): applied", self.stage, self.level),
            StageStatus::Skipped(SkipReason::NotRequested) => {
                write!(f, "{} (level {}): not requested", self.stage, self.level)
            }
            StageStatus::Skipped(SkipReason::Failed { kind, message }) => write!(
                f,
                "{} (level {}): skipped after {} failure: {}",
                self.stage, self.level, kind, message
            ),
        }
    }
}

/// Result of a transform call: the rewritten text (or the input, if nothing
/// could be applied) and what each stage did.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub text: String,
    pub requested: Level,
    pub applied_level: Level,
    pub stages: Vec<StageReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformOutcome {
    pub(crate) fn from_context(context: TransformContext, diagnostics: Vec<Diagnostic>) -> Self {
        let applied_level = applied_level(&context.reports);
        Self {
            text: context.text,
            requested: context.requested,
            applied_level,
            stages: context.reports,
            diagnostics,
        }
    }

    /// True when every stage the requested level unlocks was applied.
    pub fn is_complete(&self) -> bool {
        self.applied_level >= self.requested.clamp_to_max()
    }
}

/// Highest level `L` such that every stage at or below `L` was applied.
pub fn applied_level(reports: &[StageReport]) -> Level {
    let mut ordered = reports.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|report| report.level);
    let mut applied = Level::NONE;
    for report in ordered {
        if report.status != StageStatus::Applied {
            break;
        }
        applied = report.level;
    }
    applied
}
