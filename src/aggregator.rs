use tracing::debug;

use crate::message::Message;
use crate::planner::TimeWindow;
use crate::slack::{HistoryQuery, SlackApi};
use crate::{AppError, Result};

/// Collect every message of `window`, newest first.
///
/// Pages are requested until Slack reports no more or returns an empty page.
/// The first page is inclusive of `window.latest`, so a message stamped
/// exactly on the boundary with the newer day lands in this window. After
/// each page the upper bound moves to the oldest timestamp seen and later
/// pages only contain strictly older messages. Any API failure is returned
/// as `FetchFailed` without retrying.
pub async fn aggregate(
    api: &dyn SlackApi,
    channel: &str,
    channel_id: &str,
    window: &TimeWindow,
    page_size: u32,
) -> Result<Vec<Message>> {
    let fetch_failed = |reason: String| AppError::FetchFailed {
        channel: channel.to_string(),
        day: window.day.to_string(),
        reason,
    };

    let mut messages = Vec::new();
    let mut cursor = window.latest;
    let mut pages = 0usize;

    loop {
        let first_page = pages == 0;
        let query = HistoryQuery {
            channel_id,
            latest: cursor,
            oldest: window.oldest,
            limit: page_size,
            inclusive: first_page,
        };
        let page = api
            .history(&query)
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        pages += 1;

        if page.messages.is_empty() {
            break;
        }

        let mut page_oldest: Option<f64> = None;
        for message in page.messages {
            let Some(ts) = message.ts_secs() else {
                continue;
            };
            let below_cursor = if first_page { ts <= cursor } else { ts < cursor };
            if ts <= window.oldest || !below_cursor {
                continue;
            }
            page_oldest = Some(page_oldest.map_or(ts, |o: f64| o.min(ts)));
            messages.push(message);
        }

        if !page.has_more {
            break;
        }

        match page_oldest {
            Some(oldest) if oldest < cursor || (first_page && oldest == cursor) => {
                cursor = oldest
            }
            _ => {
                return Err(fetch_failed(format!(
                    "pagination did not advance past {}",
                    cursor
                )));
            }
        }
    }

    debug!(
        channel,
        day = %window.day,
        pages,
        messages = messages.len(),
        "aggregated window"
    );

    Ok(messages)
}
