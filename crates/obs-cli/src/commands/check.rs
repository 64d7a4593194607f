//! Syntax and structure checking command implementation

use crate::commands::common::{read_source, validate_program};
use crate::{cli::CliConfig, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the check command
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Python file to check
    pub input: PathBuf,
}

/// Execute the check command
///
/// Parses the file and runs the structural checks the bytecode serializer
/// applies, so a file that passes can be taken to level 3.
pub async fn check_command(args: CheckArgs, config: &CliConfig) -> Result<()> {
    info!("Checking {}", args.input.display());
    let source = read_source(&args.input, config).await?;
    let name = args.input.display().to_string();

    let unit = validate_program(&args.input, &source)?;

    println!(
        "{} {}: {} top-level statement(s), ok",
        style("✓").green(),
        name,
        unit.suite.len()
    );
    Ok(())
}
