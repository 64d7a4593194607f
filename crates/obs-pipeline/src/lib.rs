pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod transform;

pub use config::{FallbackPolicy, PipelineOptions};
pub use error::{PipelineDiagnostics, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
pub use report::{applied_level, SkipReason, StageReport, StageStatus, TransformContext, TransformOutcome};
pub use stages::{BytecodeSerializer, Gated, IdentifierRenamer, StringLiteralWrapper, TextStage};
pub use transform::{multi_layer_encode, transform, TransformPipeline};
