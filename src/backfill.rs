//! Per-channel backfill orchestration.
//!
//! Each channel moves through
//! `resolving -> planning -> (fetching -> writing)* -> syncing -> done`,
//! ending in `skipped` when it cannot or need not be archived and in
//! `failed` when a day could not be fetched. Channels are independent and
//! run concurrently up to the configured limit; the days of one channel are
//! processed strictly newest to oldest.

use std::fmt;
use std::sync::Arc;

use chrono::TimeZone;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::aggregator::aggregate;
use crate::archive::ArchiveWriter;
use crate::attachments::{AttachmentStats, extract, fetch_each};
use crate::job::Action;
use crate::planner::{day_of, plan};
use crate::resolver::{Channel, resolve, resolve_id};
use crate::slack::{ChannelInfo, SlackApi};
use crate::sync::Syncer;
use crate::{AppError, Result};

/// Which channels a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSelector {
    Named(Vec<String>),
    All,
}

#[derive(Debug, Clone)]
enum ChannelTarget {
    Name(String),
    Known(ChannelInfo),
}

impl ChannelTarget {
    fn name(&self) -> &str {
        match self {
            ChannelTarget::Name(name) => name,
            ChannelTarget::Known(info) => &info.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Resolving,
    Planning,
    Fetching,
    Writing,
    Syncing,
    Done,
    Skipped,
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Resolving => "resolving",
            ChannelState::Planning => "planning",
            ChannelState::Fetching => "fetching",
            ChannelState::Writing => "writing",
            ChannelState::Syncing => "syncing",
            ChannelState::Done => "done",
            ChannelState::Skipped => "skipped",
            ChannelState::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn enter(channel: &str, state: ChannelState) {
    debug!(channel, state = %state, "channel state");
}

/// What was archived for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSummary {
    pub channel: String,
    pub days_written: usize,
    pub empty_days: usize,
    pub messages: usize,
    pub attachments: AttachmentStats,
    pub synced: bool,
}

#[derive(Debug)]
pub enum ChannelOutcome {
    Done(ChannelSummary),
    Skipped { channel: String, reason: AppError },
    Failed { channel: String, error: AppError },
}

impl ChannelOutcome {
    pub fn state(&self) -> ChannelState {
        match self {
            ChannelOutcome::Done(_) => ChannelState::Done,
            ChannelOutcome::Skipped { .. } => ChannelState::Skipped,
            ChannelOutcome::Failed { .. } => ChannelState::Failed,
        }
    }
}

/// Outcomes in the order channels were requested.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl BackfillReport {
    pub fn count(&self, state: ChannelState) -> usize {
        self.outcomes.iter().filter(|o| o.state() == state).count()
    }

    pub fn messages(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                ChannelOutcome::Done(summary) => summary.messages,
                _ => 0,
            })
            .sum()
    }
}

/// Archives channel history for one team.
#[derive(Clone)]
pub struct Backfill<Z: TimeZone> {
    api: Arc<dyn SlackApi>,
    writer: ArchiveWriter,
    syncer: Syncer,
    team: String,
    zone: Z,
    page_size: u32,
    concurrency: usize,
}

impl<Z> Backfill<Z>
where
    Z: TimeZone + Send + Sync + 'static,
{
    pub fn new(
        api: Arc<dyn SlackApi>,
        writer: ArchiveWriter,
        syncer: Syncer,
        team: impl Into<String>,
        zone: Z,
    ) -> Self {
        Self {
            api,
            writer,
            syncer,
            team: team.into(),
            zone,
            page_size: 1000,
            concurrency: 4,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Backfill every selected channel.
    ///
    /// Channel-level problems end up in the report. Only errors that make
    /// the archive itself unusable (such as a failed write) abort the run.
    pub async fn run(&self, selector: ChannelSelector) -> Result<BackfillReport> {
        let targets: Vec<ChannelTarget> = match selector {
            ChannelSelector::Named(names) => names.into_iter().map(ChannelTarget::Name).collect(),
            ChannelSelector::All => self
                .api
                .list_channels()
                .await?
                .into_iter()
                .map(ChannelTarget::Known)
                .collect(),
        };
        info!(channels = targets.len(), team = %self.team, "starting backfill");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, target) in targets.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let this = self.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Task(e.to_string()))?;
                this.backfill_channel(target).await.map(|o| (index, o))
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| AppError::Task(e.to_string())).and_then(|r| r);
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        Ok(BackfillReport {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        })
    }

    async fn backfill_channel(&self, target: ChannelTarget) -> Result<ChannelOutcome> {
        let name = target.name().to_string();
        enter(&name, ChannelState::Resolving);

        let resolved = match &target {
            ChannelTarget::Name(name) => resolve(self.api.as_ref(), name).await,
            ChannelTarget::Known(info) => resolve_id(self.api.as_ref(), &info.id, &info.name).await,
        };

        let channel = match resolved {
            Ok(channel) => channel,
            Err(reason @ (AppError::ChannelNotFound(_) | AppError::NoHistory(_))) => {
                info!(channel = %name, reason = %reason, "skipping channel");
                enter(&name, ChannelState::Skipped);
                return Ok(ChannelOutcome::Skipped {
                    channel: name,
                    reason,
                });
            }
            Err(error) => {
                error!(channel = %name, error = %error, "could not resolve channel");
                enter(&name, ChannelState::Failed);
                return Ok(ChannelOutcome::Failed {
                    channel: name,
                    error,
                });
            }
        };

        match self.archive_history(&channel).await {
            Ok(summary) => Ok(ChannelOutcome::Done(summary)),
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                error!(channel = %channel.name, error = %error, "backfill aborted");
                enter(&channel.name, ChannelState::Failed);
                Ok(ChannelOutcome::Failed {
                    channel: channel.name,
                    error,
                })
            }
        }
    }

    async fn archive_history(&self, channel: &Channel) -> Result<ChannelSummary> {
        enter(&channel.name, ChannelState::Planning);
        let mut summary = ChannelSummary {
            channel: channel.name.clone(),
            ..ChannelSummary::default()
        };

        for window in plan(channel, self.zone.clone()) {
            enter(&channel.name, ChannelState::Fetching);
            let messages = aggregate(
                self.api.as_ref(),
                &channel.name,
                &channel.id,
                &window,
                self.page_size,
            )
            .await?;

            if messages.is_empty() {
                info!(channel = %channel.name, day = %window.day, "no messages this day");
                summary.empty_days += 1;
                continue;
            }

            enter(&channel.name, ChannelState::Writing);
            self.writer
                .write_messages(&self.team, &channel.name, window.day, &messages)?;

            let files = extract(&messages);
            let stats = fetch_each(self.api.as_ref(), &files, |file, bytes| {
                let day = day_of(&self.zone, file.ts).unwrap_or(window.day);
                self.writer
                    .write_attachment(&self.team, &channel.name, day, &file.name, bytes)
                    .map(|_| ())
            })
            .await?;

            info!(
                channel = %channel.name,
                day = %window.day,
                messages = messages.len(),
                attachments = stats.saved,
                failed_attachments = stats.failed,
                "archived day"
            );
            summary.days_written += 1;
            summary.messages += messages.len();
            summary.attachments.saved += stats.saved;
            summary.attachments.failed += stats.failed;
        }

        enter(&channel.name, ChannelState::Syncing);
        summary.synced = match self
            .syncer
            .sync(
                &self.writer.channel_dir(&channel.name),
                &self.team,
                Action::PullMessages.as_str(),
                &channel.name,
            )
            .await
        {
            Ok(synced) => synced,
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "sync failed, local archive kept");
                false
            }
        };

        enter(&channel.name, ChannelState::Done);
        info!(
            channel = %channel.name,
            days = summary.days_written,
            messages = summary.messages,
            "channel backfill complete"
        );
        Ok(summary)
    }
}

/// Archive the full member list as a single file, then sync it.
pub async fn pull_users(
    api: &dyn SlackApi,
    writer: &ArchiveWriter,
    syncer: &Syncer,
    team: &str,
) -> Result<usize> {
    let users = api.list_users().await?;
    let path = writer.write_users(team, &users)?;
    info!(users = users.len(), path = %path.display(), "archived user list");

    if let Err(e) = syncer
        .sync(&writer.users_dir(), team, Action::PullUsers.as_str(), "users")
        .await
    {
        warn!(error = %e, "sync failed, local archive kept");
    }

    Ok(users.len())
}
