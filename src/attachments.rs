use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::Result;
use crate::message::{Message, ts_from_value};
use crate::slack::SlackApi;

/// A downloadable file referenced by a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReference {
    pub url: String,
    /// Timestamp of the message carrying the file, epoch seconds.
    pub ts: f64,
    /// Name component used in the archive path.
    pub name: String,
}

/// Outcome of downloading one day's attachments.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentStats {
    pub saved: usize,
    pub failed: usize,
}

/// Collect file references in message order.
///
/// A file shared twice is only listed once. When two different files share a
/// name, the later one is prefixed with its file id so neither overwrites
/// the other.
pub fn extract(messages: &[Message]) -> Vec<FileReference> {
    let mut refs = Vec::new();
    let mut seen_urls = HashSet::new();
    let mut seen_names = HashSet::new();

    for message in messages {
        for file in message.files() {
            let Some(url) = file_url(file) else {
                debug!(
                    file = file.get("id").and_then(|v| v.as_str()).unwrap_or("unknown"),
                    "file has no download url"
                );
                continue;
            };
            let Some(ts) = message
                .ts_secs()
                .or_else(|| file.get("created").and_then(ts_from_value))
            else {
                continue;
            };
            if !seen_urls.insert(url.clone()) {
                continue;
            }

            let mut name = file_name(&url, file);
            if !seen_names.insert(name.clone()) {
                let id = file.get("id").and_then(|v| v.as_str()).unwrap_or("dup");
                name = format!("{}_{}", id, name);
                seen_names.insert(name.clone());
            }

            refs.push(FileReference { url, ts, name });
        }
    }

    refs
}

fn file_url(file: &Map<String, Value>) -> Option<String> {
    file.get("url_private_download")
        .or_else(|| file.get("url_private"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
}

/// Last URL path segment, else the file's `name`, else its `id`.
fn file_name(url: &str, file: &Map<String, Value>) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .or_else(|| file.get("name").and_then(|n| n.as_str()).map(|n| n.to_string()))
        .or_else(|| file.get("id").and_then(|n| n.as_str()).map(|n| n.to_string()))
        .unwrap_or_else(|| "file".to_string())
}

/// Download every reference and hand the bytes to `save`.
///
/// Downloads are independent: a failed download is logged and counted and
/// the remaining files are still attempted. Errors from `save` are returned
/// immediately.
pub async fn fetch_each<F>(
    api: &dyn SlackApi,
    refs: &[FileReference],
    mut save: F,
) -> Result<AttachmentStats>
where
    F: FnMut(&FileReference, &[u8]) -> Result<()>,
{
    let mut stats = AttachmentStats::default();

    for file in refs {
        match api.download(&file.url).await {
            Ok(bytes) => {
                save(file, &bytes)?;
                stats.saved += 1;
            }
            Err(e) => {
                warn!(url = %file.url, error = %e, "attachment download failed");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
