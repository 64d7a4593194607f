//! Multi-layer encode command implementation

use crate::commands::common::{derived_output_path, read_source, screen_program, write_output};
use crate::{cli::CliConfig, Result};
use clap::Args;
use console::style;
use obs_layers::MultiLayerEncoder;
use std::path::PathBuf;
use tracing::{debug, info};

/// Arguments for the encode command
#[derive(Debug, Clone, Args)]
pub struct EncodeArgs {
    /// Python file to encode
    pub input: PathBuf,

    /// Number of XOR/base64 rounds
    #[arg(long)]
    pub layers: Option<usize>,

    /// Output file (defaults to `<stem>_obf_ml<N><ext>` next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the encode command
pub async fn encode_command(args: EncodeArgs, config: &CliConfig) -> Result<PathBuf> {
    let layers = args.layers.unwrap_or(config.encoding.layers);
    info!("Encoding {} with {} layer(s)", args.input.display(), layers);

    let source = read_source(&args.input, config).await?;
    screen_program(&args.input, &source, config)?;
    let encoded = MultiLayerEncoder::new(layers)
        .with_key_pool(config.encoding.key_pool.iter().cloned())
        .encode(&source)?;
    debug!(keys = ?encoded.keys, payload_len = encoded.payload.len(), "encoded");

    let output = args
        .output
        .unwrap_or_else(|| derived_output_path(&args.input, &format!("obf_ml{}", layers)));
    write_output(&output, &encoded.loader).await?;

    println!(
        "{} Wrote {} ({} layer(s))",
        style("✓").green(),
        output.display(),
        layers
    );
    Ok(output)
}
