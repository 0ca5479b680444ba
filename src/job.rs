use clap::ValueEnum;
use serde::Deserialize;

use crate::backfill::ChannelSelector;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Post a message to a channel
    #[value(name = "post_message")]
    PostMessage,
    /// Backfill channel history into the archive
    #[value(name = "pull_messages")]
    PullMessages,
    /// Archive the workspace member list
    #[value(name = "pull_users")]
    PullUsers,
}

impl Action {
    /// Name used on the command line and in remote sync paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PostMessage => "post_message",
            Action::PullMessages => "pull_messages",
            Action::PullUsers => "pull_users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullMessages {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Team domain override; looked up from Slack when absent.
    #[serde(default)]
    pub team: Option<String>,
}

impl PullMessages {
    /// Channels named in the payload, or every channel when none are.
    pub fn selector(&self) -> ChannelSelector {
        let mut names: Vec<String> = self.channel.iter().cloned().collect();
        for name in &self.channels {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        if names.is_empty() {
            ChannelSelector::All
        } else {
            ChannelSelector::Named(names)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullUsers {
    #[serde(default)]
    pub team: Option<String>,
}

/// A validated unit of work, decoded once from the action and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    PostMessage(PostMessage),
    PullMessages(PullMessages),
    PullUsers(PullUsers),
}

impl Job {
    pub fn from_payload(action: Action, payload: &str) -> Result<Self> {
        let payload = if payload.trim().is_empty() { "{}" } else { payload };
        let invalid = |e: serde_json::Error| {
            AppError::InvalidPayload(format!("{}: {}", action.as_str(), e))
        };

        match action {
            Action::PostMessage => serde_json::from_str(payload)
                .map(Job::PostMessage)
                .map_err(invalid),
            Action::PullMessages => serde_json::from_str(payload)
                .map(Job::PullMessages)
                .map_err(invalid),
            Action::PullUsers => serde_json::from_str(payload)
                .map(Job::PullUsers)
                .map_err(invalid),
        }
    }
}
