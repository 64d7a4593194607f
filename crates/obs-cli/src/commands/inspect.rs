//! Loader inspection command implementation

use crate::commands::common::write_output;
use crate::{cli::CliConfig, CliError, Result};
use clap::Args;
use console::style;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Arguments for the inspect command
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Level-3 or multi-layer loader produced by obscura
    pub input: PathBuf,

    /// Write the recovered source here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Which loader shape a file turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Bytecode,
    MultiLayer,
}

/// Recovers the program text embedded in a loader.
pub fn decode_loader_text(loader: &str) -> Result<(LoaderKind, String)> {
    let bytecode_err = match obs_bytecode::extract_unit(loader) {
        Ok(unit) => {
            debug!(runtime = %unit.runtime, version = unit.version, "bytecode loader");
            let source = unit
                .source()
                .map_err(|e| CliError::Decode(e.to_string()))?;
            return Ok((LoaderKind::Bytecode, source));
        }
        Err(err) => err,
    };
    match obs_layers::decode_loader(loader) {
        Ok(source) => Ok((LoaderKind::MultiLayer, source)),
        Err(layer_err) => Err(CliError::Decode(format!(
            "not an obscura loader ({}; {})",
            bytecode_err, layer_err
        ))),
    }
}

/// Execute the inspect command
pub async fn inspect_command(args: InspectArgs, _config: &CliConfig) -> Result<()> {
    info!("Inspecting {}", args.input.display());
    let loader = read_loader(&args.input).await?;
    let (kind, source) = decode_loader_text(&loader)?;

    match &args.output {
        Some(path) => {
            write_output(path, &source).await?;
            println!(
                "{} Recovered {:?} loader into {}",
                style("✓").green(),
                kind,
                path.display()
            );
        }
        None => print!("{}", source),
    }
    Ok(())
}

async fn read_loader(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CliError::InvalidInput(format!(
            "Input file '{}' does not exist",
            path.display()
        )));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}
