//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod prefix;
mod run;
mod validate;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the full build pipeline locally for a payload file
    Run {
        /// JSON file holding the build payload
        #[arg(long)]
        payload: PathBuf,

        /// Bucket to publish to
        #[arg(long, env = "AUTOBUILDER_BUCKET")]
        bucket: Option<String>,

        /// Base URL the bucket is served from
        #[arg(long, env = "AUTOBUILDER_URL")]
        url: Option<String>,

        /// JSON file listing build dependencies to download after checkout
        #[arg(long)]
        dependencies: Option<PathBuf>,

        /// Job id to run under (random if omitted)
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Print the staging prefix and hosted URL of a build
    Prefix(prefix::PrefixArgs),
    /// Check a queue message body against the jobs queue schema
    Validate {
        /// File holding the message body
        file: PathBuf,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            payload,
            bucket,
            url,
            dependencies,
            job_id,
        } => {
            let target = run::LocalTarget {
                bucket,
                url,
                dependencies,
            };
            run::run_local(config, &payload, target, job_id).await
        }
        Commands::Prefix(args) => prefix::print_prefix(&args),
        Commands::Validate { file } => validate::validate_file(&file),
    }
}
