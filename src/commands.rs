use std::sync::Arc;

use chrono::{Local, TimeZone, Utc};
use tracing::{info, warn};

use crate::AppError;
use crate::archive::ArchiveWriter;
use crate::backfill::{
    Backfill, BackfillReport, ChannelOutcome, ChannelSelector, ChannelState, pull_users,
};
use crate::cli::Cli;
use crate::error::Result;
use crate::job::{Job, PostMessage, PullMessages, PullUsers};
use crate::load_token;
use crate::settings::{ArchiveSettings, DayZone, Settings};
use crate::slack::{SlackApi, SlackWebClient};
use crate::sync::Syncer;

/// Load settings, credentials and payload, then run the requested job.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.config)?;
    let job = Job::from_payload(cli.action, &cli.payload)?;
    let token = load_token(&cli.token_file)?;

    let api: Arc<dyn SlackApi> = Arc::new(SlackWebClient::new(&token, &settings.slack)?);
    let writer = ArchiveWriter::new(&cli.output);

    info!(action = cli.action.as_str(), output = %cli.output.display(), "starting");
    execute(job, api, writer, &settings).await
}

pub async fn execute(
    job: Job,
    api: Arc<dyn SlackApi>,
    writer: ArchiveWriter,
    settings: &Settings,
) -> Result<()> {
    let syncer = Syncer::new(&settings.sync);

    match job {
        Job::PostMessage(post) => run_post_message(api.as_ref(), &post).await.map(|_| ()),
        Job::PullMessages(pull) => {
            run_pull_messages(api, writer, syncer, &settings.archive, &pull)
                .await
                .map(|_| ())
        }
        Job::PullUsers(pull) => run_pull_users(api.as_ref(), &writer, &syncer, &pull).await,
    }
}

async fn team_domain(api: &dyn SlackApi, team: Option<&str>) -> Result<String> {
    match team {
        Some(team) if !team.is_empty() => Ok(team.to_string()),
        _ => api.team_domain().await,
    }
}

pub async fn run_post_message(api: &dyn SlackApi, post: &PostMessage) -> Result<String> {
    let channel_id = api
        .channel_id(&post.channel)
        .await?
        .ok_or_else(|| AppError::ChannelNotFound(post.channel.clone()))?;

    let ts = api
        .post_message(&channel_id, &post.text, post.thread_ts.as_deref())
        .await?;

    info!(channel = %post.channel, ts = %ts, "message posted");
    Ok(ts)
}

pub async fn run_pull_messages(
    api: Arc<dyn SlackApi>,
    writer: ArchiveWriter,
    syncer: Syncer,
    archive: &ArchiveSettings,
    pull: &PullMessages,
) -> Result<BackfillReport> {
    let team = team_domain(api.as_ref(), pull.team.as_deref()).await?;
    let selector = pull.selector();

    let report = match archive.timezone {
        DayZone::Local => {
            let backfill = Backfill::new(api, writer, syncer, team, Local);
            run_backfill(backfill, archive, selector).await?
        }
        DayZone::Utc => {
            let backfill = Backfill::new(api, writer, syncer, team, Utc);
            run_backfill(backfill, archive, selector).await?
        }
    };

    log_report(&report);
    Ok(report)
}

async fn run_backfill<Z>(
    backfill: Backfill<Z>,
    archive: &ArchiveSettings,
    selector: ChannelSelector,
) -> Result<BackfillReport>
where
    Z: TimeZone + Send + Sync + 'static,
{
    backfill
        .with_page_size(archive.page_size)
        .with_concurrency(archive.concurrency)
        .run(selector)
        .await
}

fn log_report(report: &BackfillReport) {
    for outcome in &report.outcomes {
        match outcome {
            ChannelOutcome::Failed { channel, error } => {
                warn!(channel = %channel, error = %error, "channel failed");
            }
            ChannelOutcome::Skipped { channel, reason } => {
                info!(channel = %channel, reason = %reason, "channel skipped");
            }
            ChannelOutcome::Done(_) => {}
        }
    }

    info!(
        done = report.count(ChannelState::Done),
        skipped = report.count(ChannelState::Skipped),
        failed = report.count(ChannelState::Failed),
        messages = report.messages(),
        "backfill finished"
    );
}

pub async fn run_pull_users(
    api: &dyn SlackApi,
    writer: &ArchiveWriter,
    syncer: &Syncer,
    pull: &PullUsers,
) -> Result<()> {
    let team = team_domain(api, pull.team.as_deref()).await?;
    let count = pull_users(api, writer, syncer, &team).await?;

    info!(users = count, "user export completed");
    Ok(())
}
