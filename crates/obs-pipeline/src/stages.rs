//! The three level-gated text stages and the adapter that runs them inside a
//! [`Pipeline`](crate::pipeline::Pipeline).

use obs_bytecode::{render_loader, CompileToLoadableUnit};
use obs_core::diagnostics::Diagnostic;
use obs_core::error::{Error, Result};
use obs_core::Level;
use obs_python::{rename_identifiers, wrap_string_literals, PythonUnitCompiler, RenamePolicy};
use tracing::{debug, warn};

use crate::config::{FallbackPolicy, PipelineOptions};
use crate::error::{PipelineDiagnostics, PipelineError};
use crate::pipeline::PipelineStage;
use crate::report::{SkipReason, StageReport, StageStatus, TransformContext};

/// A text-to-text pass unlocked at a given level.
pub trait TextStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn level(&self) -> Level;

    fn apply(&self, source: &str) -> Result<String>;
}

pub struct IdentifierRenamer {
    policy: RenamePolicy,
}

impl IdentifierRenamer {
    pub fn new(policy: RenamePolicy) -> Self {
        Self { policy }
    }
}

impl TextStage for IdentifierRenamer {
    fn name(&self) -> &'static str {
        "identifier-renamer"
    }

    fn level(&self) -> Level {
        Level::RENAME
    }

    fn apply(&self, source: &str) -> Result<String> {
        let output = rename_identifiers(source, self.policy)?;
        debug!(renamed = output.map.len(), policy = ?self.policy, "identifiers renamed");
        Ok(output.text)
    }
}

#[derive(Default)]
pub struct StringLiteralWrapper;

impl StringLiteralWrapper {
    pub fn new() -> Self {
        Self
    }
}

impl TextStage for StringLiteralWrapper {
    fn name(&self) -> &'static str {
        "string-literal-wrapper"
    }

    fn level(&self) -> Level {
        Level::STRINGS
    }

    fn apply(&self, source: &str) -> Result<String> {
        let output = wrap_string_literals(source)?;
        debug!(wrapped = output.wrapped, "string literals wrapped");
        Ok(output.text)
    }
}

pub struct BytecodeSerializer {
    compiler: Box<dyn CompileToLoadableUnit>,
}

impl BytecodeSerializer {
    pub fn new(compiler: impl CompileToLoadableUnit + 'static) -> Self {
        Self {
            compiler: Box::new(compiler),
        }
    }
}

impl Default for BytecodeSerializer {
    fn default() -> Self {
        Self::new(PythonUnitCompiler::new())
    }
}

impl TextStage for BytecodeSerializer {
    fn name(&self) -> &'static str {
        "bytecode-serializer"
    }

    fn level(&self) -> Level {
        Level::BYTECODE
    }

    fn apply(&self, source: &str) -> Result<String> {
        let unit = self
            .compiler
            .compile(source)
            .map_err(|err| Error::compile(err.to_string()))?;
        debug!(
            runtime = self.compiler.runtime(),
            payload_len = unit.payload.len(),
            "compiled loadable unit"
        );
        Ok(render_loader(&unit))
    }
}

/// Runs a [`TextStage`] when the requested level unlocks it and applies the
/// context's fallback policy when it fails.
pub struct Gated<S> {
    stage: S,
}

impl<S: TextStage> Gated<S> {
    pub fn new(stage: S) -> Self {
        Self { stage }
    }
}

impl<S: TextStage> PipelineStage for Gated<S> {
    type SrcCtx = TransformContext;
    type DstCtx = TransformContext;

    fn name(&self) -> &'static str {
        self.stage.name()
    }

    fn run(
        &self,
        mut context: TransformContext,
        _options: &PipelineOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> std::result::Result<TransformContext, PipelineError> {
        let name = self.stage.name();
        let level = self.stage.level();
        if !context.requested.clamp_to_max().enables(level) {
            context.reports.push(StageReport {
                stage: name,
                level,
                status: StageStatus::Skipped(SkipReason::NotRequested),
            });
            return Ok(context);
        }

        debug!(stage = name, input_len = context.text.len(), "running stage");
        match self.stage.apply(&context.text) {
            Ok(text) => {
                context.text = text;
                context.reports.push(StageReport {
                    stage: name,
                    level,
                    status: StageStatus::Applied,
                });
                Ok(context)
            }
            Err(err) => match context.fallback {
                FallbackPolicy::KeepInput => {
                    warn!(stage = name, error = %err, "stage failed, keeping its input");
                    diagnostics.push(
                        Diagnostic::warning(format!("{} skipped: {}", name, err))
                            .with_code(err.kind()),
                    );
                    context.reports.push(StageReport {
                        stage: name,
                        level,
                        status: StageStatus::Skipped(SkipReason::Failed {
                            kind: err.kind(),
                            message: err.to_string(),
                        }),
                    });
                    Ok(context)
                }
                FallbackPolicy::Abort => {
                    diagnostics.push(Diagnostic::error(err.to_string()).with_code(err.kind()));
                    Err(PipelineError::new(name, err.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs_bytecode::{extract_unit, BytecodeError, LoadableUnit};
    use pretty_assertions::assert_eq;

    struct RejectingCompiler;

    impl CompileToLoadableUnit for RejectingCompiler {
        fn runtime(&self) -> &'static str {
            "none"
        }

        fn compile(&self, _source: &str) -> std::result::Result<LoadableUnit, BytecodeError> {
            Err(BytecodeError::compile("no runtime available"))
        }
    }

    #[test]
    fn bytecode_serializer_emits_a_loader() {
        let loader = BytecodeSerializer::default().apply("print( 1 )\n").unwrap();
        assert_eq!(loader.lines().count(), 2);
        let unit = extract_unit(&loader).unwrap();
        assert_eq!(unit.source().unwrap(), "print(1)\n");
    }

    #[test]
    fn compiler_failures_become_compile_errors() {
        let err = BytecodeSerializer::new(RejectingCompiler)
            .apply("x = 1\n")
            .unwrap_err();
        assert_eq!(err.kind(), "compile");
    }

    #[test]
    fn gated_stage_records_skip_when_not_requested() {
        let stage = Gated::new(StringLiteralWrapper::new());
        let context = TransformContext::new("x = 'a'\n", Level::RENAME, FallbackPolicy::KeepInput);
        let mut diagnostics = PipelineDiagnostics::default();
        let context = stage
            .run(context, &PipelineOptions::default(), &mut diagnostics)
            .unwrap();
        assert_eq!(context.text, "x = 'a'\n");
        assert_eq!(
            context.reports[0].status,
            StageStatus::Skipped(SkipReason::NotRequested)
        );
    }

    #[test]
    fn gated_stage_keeps_input_on_failure() {
        let stage = Gated::new(IdentifierRenamer::new(RenamePolicy::ScopeAware));
        let context = TransformContext::new("def (:\n", Level::RENAME, FallbackPolicy::KeepInput);
        let mut diagnostics = PipelineDiagnostics::default();
        let context = stage
            .run(context, &PipelineOptions::default(), &mut diagnostics)
            .unwrap();
        assert_eq!(context.text, "def (:\n");
        assert!(matches!(
            context.reports[0].status,
            StageStatus::Skipped(SkipReason::Failed { kind: "parse", .. })
        ));
        assert_eq!(diagnostics.items.len(), 1);
    }

    #[test]
    fn gated_stage_aborts_when_asked() {
        let stage = Gated::new(IdentifierRenamer::new(RenamePolicy::ScopeAware));
        let context = TransformContext::new("def (:\n", Level::RENAME, FallbackPolicy::Abort);
        let mut diagnostics = PipelineDiagnostics::default();
        let err = stage
            .run(context, &PipelineOptions::default(), &mut diagnostics)
            .unwrap_err();
        assert_eq!(err.stage, "identifier-renamer");
    }
}
