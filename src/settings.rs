use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub slack: SlackSettings,
}

/// Which clock day boundaries are computed in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayZone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    #[serde(default)]
    pub timezone: DayZone,
    #[serde(default = "default_page_size", rename = "page-size")]
    pub page_size: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            timezone: DayZone::default(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_sync_command")]
    pub command: String,
    #[serde(default = "default_sync_args")]
    pub args: Vec<String>,
    /// Remote prefix such as `s3://bucket`. Sync is skipped when empty.
    #[serde(default)]
    pub bucket: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            command: default_sync_command(),
            args: default_sync_args(),
            bucket: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default = "default_api_url", rename = "api-url")]
    pub api_url: String,
    #[serde(default = "default_max_retries", rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_page_size() -> u32 {
    1000
}

fn default_concurrency() -> usize {
    4
}

fn default_sync_command() -> String {
    "aws".to_string()
}

fn default_sync_args() -> Vec<String> {
    vec!["s3".to_string(), "sync".to_string()]
}

fn default_api_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| AppError::TomlParse(e.to_string()))?;
        if settings.archive.page_size == 0 {
            return Err(AppError::TomlParse("archive.page-size must be positive".to_string()));
        }
        Ok(settings)
    }
}
