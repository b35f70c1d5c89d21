//! Resume sources: a local inbox directory and a remote HTTP feed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use hireflow_shared::{HireflowError, RawItem, Result, media_type_for};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::capability::Source;
use crate::http::{check_status, read_json, send_error};

/// File extensions picked up from the inbox.
const INBOX_EXTENSIONS: &[&str] = &["txt", "md", "json", "pdf"];

// ---------------------------------------------------------------------------
// DirectoryInbox
// ---------------------------------------------------------------------------

/// Local directory of resume files. A missing directory is an empty inbox.
pub struct DirectoryInbox {
    dir: PathBuf,
}

impl DirectoryInbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Source for DirectoryInbox {
    #[instrument(skip_all, fields(dir = %self.dir.display(), max_items = max_items))]
    async fn fetch(&self, max_items: usize) -> Result<Vec<RawItem>> {
        if !self.dir.exists() {
            debug!("inbox directory does not exist, nothing to read");
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| HireflowError::io(&self.dir, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HireflowError::io(&self.dir, e))?
        {
            let path = entry.path();
            let wanted = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| INBOX_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if wanted && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        paths.truncate(max_items);

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let content = tokio::fs::read(&path)
                .await
                .map_err(|e| HireflowError::io(&path, e))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut item = RawItem::new(
                path.display().to_string(),
                file_name.clone(),
                media_type_for(&file_name),
                content,
            );
            if let Ok(modified) = tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                item = item.with_received_at(DateTime::<Utc>::from(modified));
            }
            items.push(item);
        }

        debug!(count = items.len(), "read inbox");
        Ok(items)
    }

    fn name(&self) -> &str {
        "inbox"
    }
}

// ---------------------------------------------------------------------------
// HttpFeedSource
// ---------------------------------------------------------------------------

/// One entry of the remote feed.
#[derive(Debug, Deserialize)]
struct FeedItem {
    id: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    content_base64: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    Wrapped { items: Vec<FeedItem> },
    Bare(Vec<FeedItem>),
}

/// Remote resume feed reached over HTTP with a bearer token.
pub struct HttpFeedSource {
    client: Client,
    feed_url: Url,
    token: Option<String>,
}

impl HttpFeedSource {
    pub fn new(client: Client, feed_url: &str, token: Option<String>) -> Result<Self> {
        let feed_url = Url::parse(feed_url)
            .map_err(|e| HireflowError::config(format!("invalid feed_url {feed_url:?}: {e}")))?;
        Ok(Self {
            client,
            feed_url,
            token,
        })
    }

    fn to_raw_item(item: FeedItem) -> RawItem {
        let file_name = item.file_name.unwrap_or_else(|| format!("{}.txt", item.id));
        let media_type = item
            .media_type
            .unwrap_or_else(|| media_type_for(&file_name).to_string());

        let content = match (item.content_base64, item.text) {
            (Some(encoded), _) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .unwrap_or_else(|e| {
                    warn!(id = %item.id, error = %e, "feed item has invalid base64 content");
                    Vec::new()
                }),
            (None, Some(text)) => text.into_bytes(),
            (None, None) => Vec::new(),
        };

        let raw = RawItem::new(format!("feed:{}", item.id), file_name, media_type, content);
        match item.received_at {
            Some(at) => raw.with_received_at(at),
            None => raw,
        }
    }
}

#[async_trait]
impl Source for HttpFeedSource {
    #[instrument(skip_all, fields(url = %self.feed_url, max_items = max_items))]
    async fn fetch(&self, max_items: usize) -> Result<Vec<RawItem>> {
        let mut request = self
            .client
            .get(self.feed_url.as_str())
            .query(&[("limit", max_items)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;
        let body: FeedBody = read_json(self.name(), response).await?;

        let entries = match body {
            FeedBody::Wrapped { items } => items,
            FeedBody::Bare(items) => items,
        };
        let items: Vec<RawItem> = entries
            .into_iter()
            .take(max_items)
            .map(Self::to_raw_item)
            .collect();

        debug!(count = items.len(), "fetched feed items");
        Ok(items)
    }

    fn name(&self) -> &str {
        "resume feed"
    }
}
