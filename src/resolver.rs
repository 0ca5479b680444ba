use serde_json::Value;

use crate::message::ts_from_value;
use crate::slack::SlackApi;
use crate::{AppError, Result};

/// A channel ready to be backfilled. Fetched once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Creation time, epoch seconds.
    pub created_ts: i64,
    /// Timestamp of the newest message, fractional epoch seconds.
    pub latest_ts: f64,
}

/// Resolve a channel by name.
///
/// Returns `ChannelNotFound` when the name has no id and `NoHistory` when
/// the channel never received a message.
pub async fn resolve(api: &dyn SlackApi, name: &str) -> Result<Channel> {
    let id = api
        .channel_id(name)
        .await?
        .ok_or_else(|| AppError::ChannelNotFound(name.to_string()))?;

    resolve_id(api, &id, name).await
}

/// Resolve metadata for a channel whose id is already known.
pub async fn resolve_id(api: &dyn SlackApi, id: &str, name: &str) -> Result<Channel> {
    let info = api.channel_info(id).await?;
    channel_from_info(id, name, &info)
}

fn channel_from_info(id: &str, name: &str, info: &Value) -> Result<Channel> {
    let latest_ts = match info.get("latest") {
        None | Some(Value::Null) => return Err(AppError::NoHistory(name.to_string())),
        Some(latest) => ts_from_value(latest).ok_or_else(|| {
            AppError::InvalidTimestamp(format!("latest of {}: {}", name, latest))
        })?,
    };

    let created_ts = info
        .get("created")
        .and_then(ts_from_value)
        .map(|c| c.floor() as i64)
        .ok_or_else(|| AppError::InvalidTimestamp(format!("created of {} is missing", name)))?;

    Ok(Channel {
        id: id.to_string(),
        name: name.trim_start_matches('#').to_string(),
        created_ts,
        latest_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSlack;
    use serde_json::json;

    #[test]
    fn test_channel_from_info_message_object() {
        let info = json!({
            "id": "C1",
            "created": 1000000,
            "latest": {"type": "message", "ts": "1086500.000200"}
        });
        let channel = channel_from_info("C1", "general", &info).unwrap();
        assert_eq!(channel.created_ts, 1000000);
        assert!((channel.latest_ts - 1086500.0002).abs() < 1e-6);
    }

    #[test]
    fn test_channel_from_info_plain_latest() {
        let info = json!({"created": 5, "latest": "10.5"});
        let channel = channel_from_info("C1", "#random", &info).unwrap();
        assert_eq!(channel.name, "random");
        assert_eq!(channel.latest_ts, 10.5);
    }

    #[test]
    fn test_channel_from_info_null_latest_is_no_history() {
        let info = json!({"created": 5, "latest": null});
        let err = channel_from_info("C1", "quiet", &info).unwrap_err();
        assert!(matches!(err, AppError::NoHistory(name) if name == "quiet"));
    }

    #[test]
    fn test_channel_from_info_missing_created() {
        let info = json!({"latest": "10.0"});
        let err = channel_from_info("C1", "general", &info).unwrap_err();
        assert!(matches!(err, AppError::InvalidTimestamp(_)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_name() {
        let api = FakeSlack::new();
        let err = resolve(&api, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::ChannelNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_resolve_without_latest_key() {
        let api = FakeSlack::new().with_channel("C9", "silent", json!({"created": 1000000}));
        let err = resolve(&api, "silent").await.unwrap_err();
        assert!(matches!(err, AppError::NoHistory(_)));
    }

    #[tokio::test]
    async fn test_resolve_by_name() {
        let api = FakeSlack::new().with_channel(
            "C1",
            "general",
            json!({"created": 1000000, "latest": {"ts": "1086500.000000"}}),
        );
        let channel = resolve(&api, "#general").await.unwrap();
        assert_eq!(
            channel,
            Channel {
                id: "C1".to_string(),
                name: "general".to_string(),
                created_ts: 1000000,
                latest_ts: 1086500.0,
            }
        );
    }
}
