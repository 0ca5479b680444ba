use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slack_morphism::prelude::*;
use tracing::{debug, warn};
use url::Url;

use crate::message::{Message, format_ts};
use crate::settings::SlackSettings;
use crate::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// Bounds for one `conversations.history` call.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery<'a> {
    pub channel_id: &'a str,
    pub latest: f64,
    pub oldest: f64,
    pub limit: u32,
    /// Include messages stamped exactly on either bound.
    pub inclusive: bool,
}

/// One page of history, newest message first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// Operations the archiver needs from the Slack Web API.
///
/// Implementations are built once and shared read-only between channel
/// workers.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Look up a channel id by its name (with or without a leading `#`).
    async fn channel_id(&self, name: &str) -> Result<Option<String>>;

    /// Raw channel metadata. Carries `created` and, when the channel has
    /// ever had a message, `latest`.
    async fn channel_info(&self, channel_id: &str) -> Result<Value>;

    async fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage>;

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>>;

    async fn list_users(&self) -> Result<Vec<Value>>;

    /// Authenticated download of a private file URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Returns the `ts` of the posted message.
    async fn post_message(&self, channel_id: &str, text: &str, thread_ts: Option<&str>)
    -> Result<String>;

    async fn team_domain(&self) -> Result<String>;
}

/// Production client. Raw JSON methods go through `reqwest` so message
/// payloads keep every field; typed listing and posting go through
/// `slack-morphism`.
pub struct SlackWebClient {
    http: reqwest::Client,
    slack: SlackHyperClient,
    token: String,
    api_url: String,
    max_retries: u32,
}

impl SlackWebClient {
    pub fn new(token: &str, settings: &SlackSettings) -> Result<Self> {
        let connector =
            SlackClientHyperConnector::new().map_err(|e| AppError::SlackApi(e.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            slack: SlackClient::new(connector),
            token: token.to_string(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }

    fn api_token(&self) -> SlackApiToken {
        SlackApiToken::new(SlackApiTokenValue(self.token.clone()))
    }

    /// Call a Web API method and return the JSON body once `ok` is true.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = Url::parse_with_params(&format!("{}/{}", self.api_url, method), params)
            .map_err(|e| AppError::SlackApi(format!("{}: {}", method, e)))?;

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| AppError::SlackApi(format!("{}: {}", method, e)))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);

                if attempt >= self.max_retries {
                    return Err(AppError::SlackRateLimit { retry_after_secs });
                }
                attempt += 1;
                warn!(method, retry_after_secs, attempt, "rate limited by Slack");
                tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(AppError::SlackApi(format!(
                    "{}: HTTP {}",
                    method,
                    response.status()
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| AppError::JsonParse(e.to_string()))?;

            return check_ok(method, body);
        }
    }
}

fn check_ok(method: &str, body: Value) -> Result<Value> {
    if body.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(body);
    }
    let error = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unknown_error");
    Err(AppError::SlackApi(format!("{}: {}", method, error)))
}

fn has_next_cursor(meta: &Option<SlackResponseMetadata>) -> Option<SlackCursorId> {
    meta.as_ref()
        .and_then(|m| m.next_cursor.clone())
        .filter(|c| !c.0.is_empty())
}

pub(crate) fn parse_history_page(body: &Value) -> HistoryPage {
    let messages = body
        .get("messages")
        .and_then(|m| m.as_array())
        .map(|arr| arr.iter().cloned().filter_map(Message::from_value).collect())
        .unwrap_or_default();
    let has_more = body
        .get("has_more")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    HistoryPage { messages, has_more }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn channel_id(&self, name: &str) -> Result<Option<String>> {
        let wanted = name.trim_start_matches('#');
        let channels = self.list_channels().await?;
        Ok(channels.into_iter().find(|c| c.name == wanted).map(|c| c.id))
    }

    async fn channel_info(&self, channel_id: &str) -> Result<Value> {
        let body = self
            .call("conversations.info", &[("channel", channel_id.to_string())])
            .await?;
        let mut channel = body.get("channel").cloned().unwrap_or(Value::Null);

        let has_latest = channel.get("latest").is_some_and(|l| !l.is_null());
        if !has_latest {
            // conversations.info only reports `latest` for some channel types
            let newest = self
                .call(
                    "conversations.history",
                    &[("channel", channel_id.to_string()), ("limit", "1".to_string())],
                )
                .await?;
            let first = parse_history_page(&newest).messages.into_iter().next();
            if let (Some(message), Some(obj)) = (first, channel.as_object_mut()) {
                obj.insert("latest".to_string(), message.into_value());
            }
        }

        Ok(channel)
    }

    async fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
        debug!(
            channel = query.channel_id,
            latest = query.latest,
            oldest = query.oldest,
            "conversations.history"
        );
        let body = self
            .call(
                "conversations.history",
                &[
                    ("channel", query.channel_id.to_string()),
                    ("latest", format_ts(query.latest)),
                    ("oldest", format_ts(query.oldest)),
                    ("limit", query.limit.to_string()),
                    ("inclusive", query.inclusive.to_string()),
                ],
            )
            .await?;

        Ok(parse_history_page(&body))
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        let token = self.api_token();
        let session = self.slack.open_session(&token);

        let mut all_channels = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let request = SlackApiConversationsListRequest::new()
                .with_limit(200)
                .with_types(vec![
                    SlackConversationType::Public,
                    SlackConversationType::Private,
                ])
                .opt_cursor(cursor);

            let response = session
                .conversations_list(&request)
                .await
                .map_err(|e| AppError::SlackApi(e.to_string()))?;

            for channel in response.channels {
                all_channels.push(ChannelInfo {
                    id: channel.id.0.clone(),
                    name: channel.name.clone().unwrap_or_else(|| "unknown".to_string()),
                });
            }

            match has_next_cursor(&response.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all_channels)
    }

    async fn list_users(&self) -> Result<Vec<Value>> {
        let token = self.api_token();
        let session = self.slack.open_session(&token);

        let mut all_users = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let request = SlackApiUsersListRequest::new()
                .with_limit(200)
                .opt_cursor(cursor);

            let response = session
                .users_list(&request)
                .await
                .map_err(|e| AppError::SlackApi(e.to_string()))?;

            for user in response.members {
                all_users.push(
                    serde_json::to_value(user).map_err(|e| AppError::JsonSerialize(e.to_string()))?,
                );
            }

            match has_next_cursor(&response.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all_users)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AppError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        let token = self.api_token();
        let session = self.slack.open_session(&token);

        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId(channel_id.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .opt_thread_ts(thread_ts.map(|ts| SlackTs(ts.to_string())));

        let response = session
            .chat_post_message(&request)
            .await
            .map_err(|e| AppError::SlackApi(e.to_string()))?;

        Ok(response.ts.0)
    }

    async fn team_domain(&self) -> Result<String> {
        let body = self.call("team.info", &[]).await?;
        body.get("team")
            .and_then(|t| t.get("domain"))
            .and_then(|d| d.as_str())
            .map(|d| d.to_string())
            .ok_or_else(|| AppError::SlackApi("team.info: missing team domain".to_string()))
    }
}
