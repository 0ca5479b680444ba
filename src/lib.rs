pub mod aggregator;
pub mod archive;
pub mod attachments;
pub mod backfill;
pub mod cli;
pub mod commands;
pub mod error;
pub mod job;
pub mod logging;
pub mod message;
pub mod planner;
pub mod resolver;
pub mod settings;
pub mod slack;
pub mod sync;

#[cfg(test)]
mod fake;

use std::fs;
use std::path::Path;

pub use archive::{ArchiveKind, ArchiveWriter};
pub use backfill::{Backfill, BackfillReport, ChannelOutcome, ChannelSelector, ChannelState};
pub use cli::Cli;
pub use commands::run;
pub use error::{AppError, Result};
pub use job::{Action, Job};
pub use logging::init_logging;
pub use planner::{DayWindows, TimeWindow, plan};
pub use resolver::Channel;
pub use settings::Settings;
pub use slack::{SlackApi, SlackWebClient};

/// Read the Slack token from `path`, ignoring surrounding whitespace.
pub fn load_token(path: &Path) -> Result<String> {
    let token = fs::read_to_string(path).map_err(|e| AppError::ReadToken {
        path: path.display().to_string(),
        source: e,
    })?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::EmptyToken(path.display().to_string()));
    }
    Ok(token.to_string())
}
