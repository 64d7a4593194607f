use obs_bytecode::CompileToLoadableUnit;
use obs_core::Level;
use obs_layers::{LayerError, MultiLayerEncoder, MultiLayerOutput};
use obs_python::PythonUnitCompiler;
use tracing::{debug, info_span};

use crate::config::{FallbackPolicy, PipelineOptions};
use crate::error::{PipelineDiagnostics, PipelineError};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::report::{TransformContext, TransformOutcome};
use crate::stages::{BytecodeSerializer, Gated, IdentifierRenamer, StringLiteralWrapper};

/// Renamer, string wrapper and bytecode serializer, gated by level and run
/// in that order, each on the previous stage's output.
pub struct TransformPipeline {
    options: PipelineOptions,
    pipeline: Pipeline<TransformContext, TransformContext>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl TransformPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_compiler(options, PythonUnitCompiler::new())
    }

    pub fn with_compiler(
        options: PipelineOptions,
        compiler: impl CompileToLoadableUnit + 'static,
    ) -> Self {
        let pipeline = PipelineBuilder::new()
            .add_stage(Gated::new(IdentifierRenamer::new(options.rename_policy)))
            .add_stage(Gated::new(StringLiteralWrapper::new()))
            .add_stage(Gated::new(BytecodeSerializer::new(compiler)))
            .build();
        Self { options, pipeline }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn stage_names(&self) -> &[&'static str] {
        self.pipeline.stage_names()
    }

    /// Never fails: a failing stage passes its input through.
    pub fn transform(&self, source: &str, level: impl Into<Level>) -> TransformOutcome {
        let requested = level.into();
        let mut diagnostics = PipelineDiagnostics::default();
        let context = TransformContext::new(source, requested, FallbackPolicy::KeepInput);
        match self.pipeline.run(context, &mut diagnostics, &self.options) {
            Ok(context) => TransformOutcome::from_context(context, diagnostics.into_items()),
            // Stages only return errors under `Abort`.
            Err(_) => TransformOutcome::from_context(
                TransformContext::new(source, requested, FallbackPolicy::KeepInput),
                diagnostics.into_items(),
            ),
        }
    }

    /// Stops at the first failing stage.
    pub fn try_transform(
        &self,
        source: &str,
        level: impl Into<Level>,
    ) -> Result<TransformOutcome, PipelineError> {
        self.run_with(source, level.into(), FallbackPolicy::Abort)
    }

    /// Transforms with the fallback policy from the pipeline options.
    pub fn run(&self, source: &str, level: impl Into<Level>) -> Result<TransformOutcome, PipelineError> {
        self.run_with(source, level.into(), self.options.fallback)
    }

    fn run_with(
        &self,
        source: &str,
        requested: Level,
        fallback: FallbackPolicy,
    ) -> Result<TransformOutcome, PipelineError> {
        let _span = info_span!("transform", level = requested.0, ?fallback).entered();
        let mut diagnostics = PipelineDiagnostics::default();
        let context = TransformContext::new(source, requested, fallback);
        let context = self.pipeline.run(context, &mut diagnostics, &self.options)?;
        let outcome = TransformOutcome::from_context(context, diagnostics.into_items());
        debug!(
            requested = outcome.requested.0,
            applied = outcome.applied_level.0,
            "transform finished"
        );
        Ok(outcome)
    }
}

/// Transforms with the default pipeline and options.
pub fn transform(source: &str, level: impl Into<Level>) -> TransformOutcome {
    TransformPipeline::default().transform(source, level)
}

/// Wraps the whole text in `layers` XOR/base64 rounds behind a loader.
pub fn multi_layer_encode(source: &str, layers: usize) -> Result<MultiLayerOutput, LayerError> {
    MultiLayerEncoder::new(layers).encode(source)
}
