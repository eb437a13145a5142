use crate::anchor::{AnchorDescriptor, Anchorable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Author recorded when the embedder never configured one.
pub const DEFAULT_AUTHOR: &str = "Anonymous";

/// A placed comment. Immutable once created; the anchor descriptor
/// serializes flattened into the same record, so the stored JSON is one flat
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    #[serde(default = "default_author")]
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub page_url: String,
    #[serde(flatten)]
    pub anchor: AnchorDescriptor,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

impl Anchorable for Comment {
    fn anchor(&self) -> &AnchorDescriptor {
        &self.anchor
    }
}

/// Payload for creating a comment; the store assigns id, author and
/// creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub text: String,
    pub page_url: String,
    #[serde(flatten)]
    pub anchor: AnchorDescriptor,
}

/// Where comments are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    #[default]
    Local,
    Api,
}

/// Embedder-facing store configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub mode: StoreMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl StoreConfig {
    /// Remote mode only engages when the config is complete; a partial
    /// config silently stays local.
    pub fn remote_ready(&self) -> bool {
        self.mode == StoreMode::Api
            && self.base_url.as_deref().is_some_and(|s| !s.is_empty())
            && self.project_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Failures inside the store stack. These never cross the [`CommentStore`]
/// boundary; [`CommentService`] logs them and falls back.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage format: {0}")]
    Format(#[from] serde_json::Error),
    #[error("remote api: {detail}")]
    Remote { detail: String },
}

impl StoreError {
    pub fn remote(detail: impl Into<String>) -> Self {
        Self::Remote {
            detail: detail.into(),
        }
    }
}

/// Unique comment id in the stored format: millisecond timestamp plus a
/// random suffix.
pub fn generate_comment_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::random();
    format!("pin-{millis}-{suffix:08x}")
}

/// The narrow contract the overlay depends on. Implementations own their
/// persistence failures; callers never see an error.
pub trait CommentStore {
    /// All comments for a page, oldest first. Failures come back as an
    /// empty list.
    fn fetch_comments(&mut self, page_url: &str) -> Vec<Comment>;

    /// Create and persist a comment. The returned comment is valid
    /// in-memory even when persistence had to fall back.
    fn create_comment(&mut self, input: CommentInput, author: &str) -> Comment;

    fn update_config(&mut self, config: StoreConfig);
}

/// File-backed store: one JSON file per page, named by the md5 hash of the
/// page URL. Without a directory it is ephemeral and keeps everything in
/// memory.
#[derive(Debug, Default)]
pub struct LocalCommentStore {
    dir: Option<PathBuf>,
    cache: HashMap<String, Vec<Comment>>,
}

impl LocalCommentStore {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            cache: HashMap::new(),
        }
    }

    /// Storage directory override via `PAGEPIN_COMMENTS_DIR`, otherwise
    /// `.pagepin_comments` under the current directory.
    pub fn default_dir() -> PathBuf {
        if let Ok(custom_dir) = std::env::var("PAGEPIN_COMMENTS_DIR") {
            PathBuf::from(custom_dir)
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(".pagepin_comments")
        }
    }

    fn compute_page_hash(page_url: &str) -> String {
        let digest = md5::compute(page_url.as_bytes());
        format!("{digest:x}")
    }

    fn file_for(&self, page_url: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("comments_{}.json", Self::compute_page_hash(page_url))))
    }

    pub fn load(&mut self, page_url: &str) -> Result<Vec<Comment>, StoreError> {
        if let Some(cached) = self.cache.get(page_url) {
            return Ok(cached.clone());
        }
        let comments: Vec<Comment> = match self.file_for(page_url) {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)?;
                if content.trim().is_empty() {
                    Vec::new()
                } else {
                    serde_json::from_str(&content)?
                }
            }
            _ => Vec::new(),
        };
        self.cache.insert(page_url.to_string(), comments.clone());
        Ok(comments)
    }

    /// Read a page's comments, tolerating a missing or unreadable file. An
    /// unreadable file is logged and treated as empty, so the next save
    /// starts the page over rather than wedging it.
    pub fn load_or_empty(&mut self, page_url: &str) -> Vec<Comment> {
        match self.load(page_url) {
            Ok(comments) => comments,
            Err(e) => {
                log::warn!("Failed to read local comments for {page_url}: {e}");
                self.cache.insert(page_url.to_string(), Vec::new());
                Vec::new()
            }
        }
    }

    pub fn append(&mut self, comment: Comment) -> Result<(), StoreError> {
        let page_url = comment.page_url.clone();
        self.load_or_empty(&page_url);
        self.cache.entry(page_url.clone()).or_default().push(comment);
        self.save(&page_url)
    }

    fn save(&self, page_url: &str) -> Result<(), StoreError> {
        let Some(path) = self.file_for(page_url) else {
            // Ephemeral stores keep comments in memory only.
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let comments = self.cache.get(page_url).map(Vec::as_slice).unwrap_or(&[]);
        let content = serde_json::to_string_pretty(comments)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Transport seam for a hosted comment API. The crate ships no HTTP client;
/// embedders implement this against their own stack, tests script it.
pub trait RemoteBackend {
    fn fetch_comments(
        &mut self,
        config: &StoreConfig,
        page_url: &str,
    ) -> Result<Vec<Comment>, StoreError>;

    fn create_comment(
        &mut self,
        config: &StoreConfig,
        comment: &Comment,
    ) -> Result<Comment, StoreError>;
}

/// Store front the overlay talks to: remote when fully configured, local as
/// the ever-present fallback. Every failure is logged and masked here, so
/// placement and rendering never observe storage trouble.
pub struct CommentService {
    config: StoreConfig,
    local: LocalCommentStore,
    remote: Option<Box<dyn RemoteBackend>>,
}

impl CommentService {
    pub fn new(config: StoreConfig, local: LocalCommentStore) -> Self {
        Self {
            config,
            local,
            remote: None,
        }
    }

    pub fn with_remote(
        config: StoreConfig,
        local: LocalCommentStore,
        remote: Box<dyn RemoteBackend>,
    ) -> Self {
        Self {
            config,
            local,
            remote: Some(remote),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl CommentStore for CommentService {
    fn fetch_comments(&mut self, page_url: &str) -> Vec<Comment> {
        if self.config.remote_ready() {
            if let Some(remote) = self.remote.as_mut() {
                match remote.fetch_comments(&self.config, page_url) {
                    Ok(comments) => return comments,
                    Err(e) => {
                        log::warn!("Remote fetch failed, falling back to local: {e}");
                    }
                }
            }
        }
        self.local.load_or_empty(page_url)
    }

    fn create_comment(&mut self, input: CommentInput, author: &str) -> Comment {
        let comment = Comment {
            id: generate_comment_id(),
            text: input.text,
            author: if author.is_empty() {
                DEFAULT_AUTHOR.to_string()
            } else {
                author.to_string()
            },
            created_at: Utc::now(),
            page_url: input.page_url,
            anchor: input.anchor,
        };

        if self.config.remote_ready() {
            if let Some(remote) = self.remote.as_mut() {
                match remote.create_comment(&self.config, &comment) {
                    Ok(created) => return created,
                    Err(e) => {
                        log::warn!("Remote create failed, storing locally: {e}");
                    }
                }
            }
        }

        if let Err(e) = self.local.append(comment.clone()) {
            log::error!("Failed to persist comment {}: {e}", comment.id);
        }
        comment
    }

    fn update_config(&mut self, config: StoreConfig) {
        self.config = config;
    }
}
