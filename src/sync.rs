use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::settings::SyncSettings;
use crate::{AppError, Result};

/// Mirrors archive subtrees to a remote bucket with an external tool
/// (`aws s3 sync` by default).
#[derive(Debug, Clone)]
pub struct Syncer {
    command: String,
    args: Vec<String>,
    bucket: String,
}

impl Syncer {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            bucket: settings.bucket.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.bucket.is_empty()
    }

    /// `{bucket}/plugins/slack/{team}/{action}/{target}`
    pub fn remote_path(&self, team: &str, action: &str, target: &str) -> String {
        format!("{}/plugins/slack/{}/{}/{}", self.bucket, team, action, target)
    }

    /// Mirror `local` to the remote path for `target`.
    ///
    /// Returns `Ok(false)` when no bucket is configured. A failing command is
    /// reported as `SyncFailed`; local files are never touched.
    pub async fn sync(&self, local: &Path, team: &str, action: &str, target: &str) -> Result<bool> {
        if !self.is_enabled() {
            info!(archive = target, "no sync bucket configured, keeping archive local");
            return Ok(false);
        }

        let remote = self.remote_path(team, action, target);
        info!(local = %local.display(), remote = %remote, "syncing archive");

        let sync_failed = |reason: String| AppError::SyncFailed {
            local: local.display().to_string(),
            remote: remote.clone(),
            reason,
        };

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(local)
            .arg(&remote)
            .output()
            .await
            .map_err(|e| sync_failed(format!("cannot run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(sync_failed(format!("{}: {}", output.status, stderr.trim())));
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn syncer(command: &str, bucket: &str) -> Syncer {
        Syncer::new(&SyncSettings {
            command: command.to_string(),
            args: vec![],
            bucket: bucket.to_string(),
        })
    }

    #[test]
    fn test_remote_path() {
        let s = syncer("aws", "s3://backups/");
        assert_eq!(
            s.remote_path("acme", "pull_messages", "general"),
            "s3://backups/plugins/slack/acme/pull_messages/general"
        );
        assert_eq!(
            s.remote_path("acme", "pull_users", "users"),
            "s3://backups/plugins/slack/acme/pull_users/users"
        );
    }

    #[tokio::test]
    async fn test_sync_disabled_without_bucket() {
        let dir = tempdir().unwrap();
        let synced = syncer("aws", "")
            .sync(dir.path(), "acme", "pull_messages", "general")
            .await
            .unwrap();
        assert!(!synced);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_success() {
        let dir = tempdir().unwrap();
        let synced = syncer("true", "s3://b")
            .sync(dir.path(), "acme", "pull_messages", "general")
            .await
            .unwrap();
        assert!(synced);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_failure_is_reported() {
        let dir = tempdir().unwrap();
        let err = syncer("false", "s3://b")
            .sync(dir.path(), "acme", "pull_messages", "general")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SyncFailed { .. }));
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_sync_missing_command() {
        let dir = tempdir().unwrap();
        let err = syncer("definitely-not-a-sync-tool-1234", "s3://b")
            .sync(dir.path(), "acme", "pull_users", "users")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot run"));
    }
}
