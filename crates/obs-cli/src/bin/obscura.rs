//! Obscura CLI Binary
//!
//! # Usage
//!
//! ```bash
//! # Rename identifiers and wrap string literals (writes app_obf_l2.py)
//! obscura transform app.py --level 2
//!
//! # Full pipeline, failing on the first stage error
//! obscura transform app.py --level 3 --strict
//!
//! # Three XOR/base64 rounds behind a self-decoding loader
//! obscura encode app.py --layers 3
//!
//! # Recover the program behind a loader
//! obscura inspect app_obf_l3.py
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use obs_cli::{
    cli::CliConfig,
    commands::{
        self, check::CheckArgs, encode::EncodeArgs, inspect::InspectArgs,
        transform::TransformArgs,
    },
    diagnostics::setup_error_reporting,
    Result,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "obscura",
    version = env!("CARGO_PKG_VERSION"),
    about = "Obscura: staged and multi-layer obfuscation for Python source",
    long_about = r#"
Obscura rewrites Python source so it stays runnable but is harder to read.

LEVELS:
    1  rename identifiers to var_NNNN placeholders
    2  level 1, then wrap string literals in base64 decode calls
    3  level 2, then compress the program behind a one-line loader

EXAMPLES:
    obscura transform app.py -l 3         # Writes app_obf_l3.py
    obscura encode app.py --layers 2      # Writes app_obf_ml2.py
    obscura check app.py                  # Report syntax errors
    "#
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the level-gated rename/strings/bytecode stages over a file
    Transform(TransformArgs),

    /// Wrap a file in XOR/base64 rounds behind a loader
    Encode(EncodeArgs),

    /// Parse a file and report syntax errors
    Check(CheckArgs),

    /// Decode a loader produced by `transform -l 3` or `encode`
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_error_reporting()?;
    setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format);

    let result = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Transform(args) => commands::transform_command(args, &config)
                .await
                .map(|_| ()),
            Commands::Encode(args) => commands::encode_command(args, &config).await.map(|_| ()),
            Commands::Check(args) => commands::check_command(args, &config).await,
            Commands::Inspect(args) => commands::inspect_command(args, &config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            if cli.verbose > 0 {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            use tracing::error;
            if !obs_cli::diagnostics::render_cli_error(&e) {
                error!("{}", e);
            }
            if cli.verbose > 0 {
                error!(?e, "detailed error context");
            }
            std::process::exit(1);
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool, log_level: Option<LogLevel>, log_format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout is reserved for command output such as `inspect`.
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(formatter)
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(formatter.json())
                .with(filter)
                .init();
        }
    }
}
