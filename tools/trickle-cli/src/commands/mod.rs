//! CLI command implementations.

pub mod config;
pub mod demo;

use clap::{Args, Subcommand};

/// Arguments for the demo command.
#[derive(Args)]
pub struct DemoArgs {
    /// Wait for every section inline instead of streaming patches.
    #[arg(long)]
    pub blocking: bool,

    /// Base delay between section resolutions, in milliseconds.
    #[arg(short, long)]
    pub delay_ms: Option<u64>,

    /// Resolve the reviews section with an error.
    #[arg(long)]
    pub fail_reviews: bool,

    /// Leave out a fragment the page needs, failing the render.
    #[arg(long)]
    pub break_fragment: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Where to write the file (default: trickle.toml).
        path: Option<String>,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}
