//! Command-line arguments and logging setup

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LoggingConfig;

/// Command-line arguments for thzsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "thzsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Stiebel Eltron / Tecalor THZ heat pump client",
    long_about = None
)]
pub struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long, env = "THZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the controller firmware version
    Firmware,
    /// Dump the raw bytes of a block
    Block {
        /// Block id, e.g. FB or 0A0176
        id: String,
        /// Bypass the cache
        #[arg(long)]
        fresh: bool,
    },
    /// Decode a block, or a single field of it
    Read { block: String, field: Option<String> },
    /// Read a writable setting
    Get { setting: String },
    /// Write a setting
    Set { setting: String, value: String },
    /// List the register catalog
    Registers {
        /// Show the catalog for this firmware instead of the connected one
        #[arg(long)]
        firmware: Option<String>,
    },
    /// Decode every block periodically until Ctrl-C
    Poll,
}

/// Install the tracing subscriber
///
/// `--log-level` wins over the configured level; `RUST_LOG` wins over both.
pub fn initialize_logging(args: &Args, logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = args.log_level.as_deref().unwrap_or(&logging.level);
    let config = common::LogConfig {
        service_name: "thzsrv".to_string(),
        console_level: common::logging::parse_level(level),
        log_dir: logging.dir.clone(),
        enable_json: logging.json,
        ansi: !args.no_color,
    };

    common::logging::init_with_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
