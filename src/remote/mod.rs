//! # Remote Store Boundary
//!
//! The contract between the engine and the repository-backed remote
//! portfolio. The engine depends only on directory listings, raw file
//! content, SHAs and a save operation.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryRemote` | `memory` | In-memory, with failure injection, for testing/embedding |
//! | `GitHubRemote` | `github` | GitHub contents API (feature `github`) |

pub mod cache;
pub mod index;
pub mod memory;
#[cfg(feature = "github")]
pub mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use cache::{CacheStats, RemoteIndexCache};
pub use index::{RemoteIndex, RemoteIndexEntry};
pub use memory::MemoryRemote;
#[cfg(feature = "github")]
pub use github::GitHubRemote;

// ============================================================================
// Listing types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl RemoteFileInfo {
    pub fn is_element_file(&self) -> bool {
        self.kind == FileKind::File && self.name.ends_with(".md")
    }
}

/// Remote rate-limit budget as last reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

// ============================================================================
// RemoteStore Trait
// ============================================================================

/// The remote portfolio contract.
///
/// Missing directories must surface as `Error::NotFound`, a missing
/// repository on save as `Error::RepositoryNotFound`, and credential
/// problems as `Error::Authentication`.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Login of the authenticated user; fails if no valid credential exists.
    async fn authenticated_username(&self) -> Result<String>;

    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool>;

    /// List one directory of the repository.
    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RemoteFileInfo>>;

    /// Raw content behind a listing's `download_url`.
    async fn fetch_content(&self, download_url: &str) -> Result<String>;

    /// Head commit SHA, when the store can report one.
    async fn latest_commit_sha(&self, _owner: &str, _repo: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Create or replace a file. Returns its public URL.
    async fn save_element(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String>;

    /// Last known rate-limit budget.
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_deserializes_from_contents_api_shape() {
        let json = r#"[
            {"name": "a.md", "type": "file", "path": "skills/a.md", "sha": "1", "size": 12,
             "html_url": "https://h/a", "download_url": "https://d/a", "url": "ignored"},
            {"name": "sub", "type": "dir", "path": "skills/sub", "sha": "2", "size": 0,
             "html_url": null, "download_url": null},
            {"name": "link", "type": "symlink", "path": "skills/link", "sha": "3"}
        ]"#;
        let listing: Vec<RemoteFileInfo> = serde_json::from_str(json).unwrap();
        assert!(listing[0].is_element_file());
        assert_eq!(listing[1].kind, FileKind::Dir);
        assert_eq!(listing[2].kind, FileKind::Other);
        assert!(!listing[2].is_element_file());
    }
}
