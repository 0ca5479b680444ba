use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to read token file at {path}: {source}")]
    ReadToken {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("token file at {0} is empty")]
    EmptyToken(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel {0} has no message history")]
    NoHistory(String),

    #[error("failed to fetch history for {channel} on {day}: {reason}")]
    FetchFailed {
        channel: String,
        day: String,
        reason: String,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("Slack rate limit error: retry after {retry_after_secs}s")]
    SlackRateLimit { retry_after_secs: u64 },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to read file at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("sync of {local} to {remote} failed: {reason}")]
    SyncFailed {
        local: String,
        remote: String,
        reason: String,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialize(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("worker task failed: {0}")]
    Task(String),
}

impl AppError {
    /// Errors after which no further archive output can be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::WriteFile { .. } | AppError::JsonSerialize(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_read_token_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = AppError::ReadToken {
            path: "/etc/slack/token".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/etc/slack/token"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_empty_token_display() {
        let err = AppError::EmptyToken("token.txt".to_string());
        assert_eq!(err.to_string(), "token file at token.txt is empty");
    }

    #[test]
    fn test_channel_not_found_display() {
        let err = AppError::ChannelNotFound("general".to_string());
        assert_eq!(err.to_string(), "channel not found: general");
    }

    #[test]
    fn test_no_history_display() {
        let err = AppError::NoHistory("empty".to_string());
        assert_eq!(err.to_string(), "channel empty has no message history");
    }

    #[test]
    fn test_fetch_failed_display() {
        let err = AppError::FetchFailed {
            channel: "general".to_string(),
            day: "2024-03-01".to_string(),
            reason: "invalid_auth".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch history for general on 2024-03-01: invalid_auth"
        );
    }

    #[test]
    fn test_slack_rate_limit_display() {
        let err = AppError::SlackRateLimit { retry_after_secs: 30 };
        assert_eq!(err.to_string(), "Slack rate limit error: retry after 30s");
    }

    #[test]
    fn test_write_file_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = AppError::WriteFile {
            path: "/archive/general".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/archive/general"));
        assert!(err.to_string().contains("failed to write file"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_sync_failed_display() {
        let err = AppError::SyncFailed {
            local: "/archive/general".to_string(),
            remote: "s3://bucket/plugins/slack/acme/pull_messages/general".to_string(),
            reason: "exit status: 1".to_string(),
        };
        assert!(err.to_string().contains("s3://bucket"));
        assert!(err.to_string().contains("exit status: 1"));
    }

    #[test]
    fn test_is_fatal() {
        let write = AppError::WriteFile {
            path: "x".to_string(),
            source: io::Error::other("disk full"),
        };
        assert!(write.is_fatal());
        assert!(!AppError::NoHistory("x".to_string()).is_fatal());
        assert!(!AppError::SlackApi("ratelimited".to_string()).is_fatal());
        assert!(
            !AppError::SyncFailed {
                local: "a".to_string(),
                remote: "b".to_string(),
                reason: "c".to_string(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
    }
}
