//! Autobuilder CLI
//!
//! Local operator tooling for the build worker: run the pipeline against a
//! payload file, resolve staging prefixes and check queue message bodies.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "autobuilder")]
#[command(about = "Documentation build worker CLI", long_about = None)]
struct Cli {
    /// Directory holding repository checkouts
    #[arg(long, env = "REPOS_DIR", default_value = "repos")]
    repos_dir: String,

    /// Directory of the site renderer
    #[arg(long, env = "SNOOTY_DIR", default_value = "snooty")]
    snooty_dir: String,

    /// Stages whose failure does not halt the pipeline
    #[arg(long, env = "CONTINUE_ON_FAILURE", default_value = "persist,html,oas")]
    continue_on_failure: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.repos_dir, &cli.snooty_dir, &cli.continue_on_failure)?;

    handle_command(cli.command, &config).await
}
