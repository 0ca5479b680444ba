//! In-memory Slack workspace used by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::message::Message;
use crate::slack::{ChannelInfo, HistoryPage, HistoryQuery, SlackApi};
use crate::{AppError, Result};

#[derive(Default)]
pub struct FakeSlack {
    channels: Vec<(ChannelInfo, Value)>,
    history: HashMap<String, Vec<Message>>,
    scripted: Mutex<VecDeque<HistoryPage>>,
    failing_history: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    users: Vec<Value>,
    pub queries: Mutex<Vec<(String, f64, f64, bool)>>,
    pub posted: Mutex<Vec<(String, String, Option<String>)>>,
}

impl FakeSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, id: &str, name: &str, info: Value) -> Self {
        self.channels.push((
            ChannelInfo {
                id: id.to_string(),
                name: name.to_string(),
            },
            info,
        ));
        self
    }

    /// Messages for a channel, in any order.
    pub fn with_messages(mut self, channel_id: &str, messages: Vec<Value>) -> Self {
        let mut messages: Vec<Message> =
            messages.into_iter().filter_map(Message::from_value).collect();
        messages.sort_by(|a, b| {
            b.ts_secs()
                .unwrap_or(0.0)
                .total_cmp(&a.ts_secs().unwrap_or(0.0))
        });
        self.history.insert(channel_id.to_string(), messages);
        self
    }

    /// Pages returned in order regardless of the query bounds.
    pub fn with_pages(self, pages: Vec<HistoryPage>) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(pages);
        }
        self
    }

    pub fn with_failing_history(mut self, channel_id: &str) -> Self {
        self.failing_history.insert(channel_id.to_string());
        self
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn with_users(mut self, users: Vec<Value>) -> Self {
        self.users = users;
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }
}

pub fn message(ts: &str, text: &str) -> Value {
    json!({"type": "message", "ts": ts, "user": "U1", "text": text})
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn channel_id(&self, name: &str) -> Result<Option<String>> {
        let wanted = name.trim_start_matches('#');
        Ok(self
            .channels
            .iter()
            .find(|(c, _)| c.name == wanted)
            .map(|(c, _)| c.id.clone()))
    }

    async fn channel_info(&self, channel_id: &str) -> Result<Value> {
        self.channels
            .iter()
            .find(|(c, _)| c.id == channel_id)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| AppError::SlackApi("channel_not_found".to_string()))
    }

    async fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((
                query.channel_id.to_string(),
                query.latest,
                query.oldest,
                query.inclusive,
            ));
        }

        if self.failing_history.contains(query.channel_id) {
            return Err(AppError::SlackApi("invalid_auth".to_string()));
        }

        if let Ok(mut scripted) = self.scripted.lock()
            && let Some(page) = scripted.pop_front()
        {
            return Ok(page);
        }

        let in_range: Vec<Message> = self
            .history
            .get(query.channel_id)
            .map(|all| {
                all.iter()
                    .filter(|m| {
                        m.ts_secs().is_some_and(|ts| {
                            if query.inclusive {
                                ts >= query.oldest && ts <= query.latest
                            } else {
                                ts > query.oldest && ts < query.latest
                            }
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let limit = query.limit as usize;
        let has_more = in_range.len() > limit;
        Ok(HistoryPage {
            messages: in_range.into_iter().take(limit).collect(),
            has_more,
        })
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.channels.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn list_users(&self) -> Result<Vec<Value>> {
        Ok(self.users.clone())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.files.get(url).cloned().ok_or_else(|| AppError::Download {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        if let Ok(mut posted) = self.posted.lock() {
            posted.push((
                channel_id.to_string(),
                text.to_string(),
                thread_ts.map(|t| t.to_string()),
            ));
        }
        Ok("1700000000.000100".to_string())
    }

    async fn team_domain(&self) -> Result<String> {
        Ok("acme".to_string())
    }
}
