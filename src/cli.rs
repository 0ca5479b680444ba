use std::path::PathBuf;

use clap::Parser;

use crate::job::Action;
use crate::settings::SETTINGS_FILE;

#[derive(Debug, Parser)]
#[command(name = "slack-backfill")]
#[command(about = "Archive Slack channel history and files into a date-partitioned backup")]
pub struct Cli {
    /// Slack action to perform
    #[arg(short, long, value_enum)]
    pub action: Action,

    /// JSON payload for the action
    #[arg(short, long, default_value = "{}")]
    pub payload: String,

    /// File containing the Slack API token
    #[arg(short, long)]
    pub token_file: PathBuf,

    /// Archive root directory
    #[arg(short, long, default_value = "archive")]
    pub output: PathBuf,

    /// Settings file (TOML)
    #[arg(short, long, default_value = SETTINGS_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}
