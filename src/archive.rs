//! On-disk archive layout.
//!
//! ```text
//! {root}/{channel}/{YYYY-MM}/messages/{team}_{channel}_{YYYY-MM-DD}.json
//! {root}/{channel}/{YYYY-MM}/binaries/{team}_{channel}_{YYYY-MM-DD}_{file}.json
//! {root}/users/{team}_users.json
//! ```
//!
//! Every path is a pure function of its inputs and every file's content a
//! pure function of the data written, so re-running a backfill rewrites the
//! same bytes to the same places.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::message::Message;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Messages,
    Binaries,
    Users,
}

impl ArchiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Messages => "messages",
            ArchiveKind::Binaries => "binaries",
            ArchiveKind::Users => "users",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Subtree holding everything archived for one channel.
    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.root.join(sanitize(channel))
    }

    pub fn users_dir(&self) -> PathBuf {
        self.root.join(ArchiveKind::Users.as_str())
    }

    pub fn day_path(
        &self,
        team: &str,
        channel: &str,
        day: NaiveDate,
        kind: ArchiveKind,
        name: Option<&str>,
    ) -> PathBuf {
        let channel = sanitize(channel);
        let mut file_name = format!("{}_{}_{}", sanitize(team), channel, day.format("%Y-%m-%d"));
        if let Some(name) = name {
            file_name.push('_');
            file_name.push_str(&sanitize(name));
        }
        file_name.push_str(".json");

        self.root
            .join(&channel)
            .join(day.format("%Y-%m").to_string())
            .join(kind.as_str())
            .join(file_name)
    }

    pub fn users_path(&self, team: &str) -> PathBuf {
        self.users_dir().join(format!("{}_users.json", sanitize(team)))
    }

    /// Write one day's messages, in the order given.
    pub fn write_messages(
        &self,
        team: &str,
        channel: &str,
        day: NaiveDate,
        messages: &[Message],
    ) -> Result<PathBuf> {
        let path = self.day_path(team, channel, day, ArchiveKind::Messages, None);
        write_atomic(&path, &to_json(messages)?)?;
        Ok(path)
    }

    /// Write the raw bytes of one attachment.
    pub fn write_attachment(
        &self,
        team: &str,
        channel: &str,
        day: NaiveDate,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.day_path(team, channel, day, ArchiveKind::Binaries, Some(name));
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn write_users(&self, team: &str, users: &[serde_json::Value]) -> Result<PathBuf> {
        let path = self.users_path(team);
        write_atomic(&path, &to_json(users)?)?;
        Ok(path)
    }
}

fn to_json<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(data).map_err(|e| AppError::JsonSerialize(e.to_string()))
}

/// Replace anything that could turn a name component into a path.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .trim_start_matches('#')
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Write through a temporary sibling and rename, so readers never see a
/// partially written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |p: &Path, e: std::io::Error| AppError::WriteFile {
        path: p.display().to_string(),
        source: e,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp, bytes).map_err(|e| write_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(path, e));
    }
    Ok(())
}
