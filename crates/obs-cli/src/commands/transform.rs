//! Staged transform command implementation

use crate::commands::common::{derived_output_path, read_source, screen_program, write_output};
use crate::{cli::CliConfig, Result};
use clap::Args;
use console::style;
use obs_core::Level;
use obs_pipeline::{SkipReason, StageStatus, TransformOutcome, TransformPipeline};
use obs_python::RenamePolicy;
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for the transform command
#[derive(Debug, Clone, Args)]
pub struct TransformArgs {
    /// Python file to obfuscate
    pub input: PathBuf,

    /// Obfuscation level: 1 renames, 2 also wraps strings, 3 also serializes
    #[arg(short, long)]
    pub level: Option<u8>,

    /// Output file (defaults to `<stem>_obf_l<LEVEL><ext>` next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Identifier renaming policy: lexical or scope-aware
    #[arg(long)]
    pub policy: Option<RenamePolicy>,

    /// Fail on the first stage error instead of keeping that stage's input
    /// (overrides the configured fallback)
    #[arg(long)]
    pub strict: bool,
}

/// Execute the transform command
pub async fn transform_command(args: TransformArgs, config: &CliConfig) -> Result<PathBuf> {
    let level = args.level.unwrap_or(config.obfuscation.default_level);
    info!("Transforming {} at level {}", args.input.display(), level);

    let source = read_source(&args.input, config).await?;
    screen_program(&args.input, &source, config)?;

    let mut options = config.pipeline_options();
    if let Some(policy) = args.policy {
        options = options.with_rename_policy(policy);
    }
    let pipeline = TransformPipeline::new(options);
    let outcome = if args.strict {
        pipeline.try_transform(&source, level)?
    } else {
        pipeline.run(&source, level)?
    };
    report_skipped_stages(&outcome);

    let output = args
        .output
        .unwrap_or_else(|| derived_output_path(&args.input, &format!("obf_l{}", level)));
    write_output(&output, &outcome.text).await?;

    println!(
        "{} Wrote {} (applied level {} of {})",
        style("✓").green(),
        output.display(),
        outcome.applied_level,
        Level::from(level).clamp_to_max()
    );
    Ok(output)
}

fn report_skipped_stages(outcome: &TransformOutcome) {
    for report in &outcome.stages {
        if let StageStatus::Skipped(SkipReason::Failed { .. }) = report.status {
            warn!("{}", report);
        }
    }
}
