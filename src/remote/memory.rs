//! In-memory remote store.
//!
//! This is the reference implementation of `RemoteStore`.
//! It keeps files in a map protected by RwLock and can inject failures.
//!
//! ## Behaviour
//!
//! - Listing SHAs are real git blob SHAs of the stored content.
//! - A directory with no files lists as `Error::NotFound`, like a 404.
//! - Every fetch can be delayed by a configurable latency, and the peak
//!   number of concurrent fetches is recorded.
//!
//! Use this store for:
//! - Testing the cache and sync orchestration without a network
//! - Embedding in applications that keep their "remote" in process

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FileKind, RemoteFileInfo, RemoteStore};
use crate::hash::git_blob_sha;
use crate::{Error, Result};

const URL_SCHEME: &str = "memory://";

// ============================================================================
// MemoryRemote
// ============================================================================

/// In-memory remote portfolio for a single owner and repository.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    owner: String,
    repo: String,
    identity: RwLock<Option<String>>,
    repository_exists: RwLock<bool>,
    /// path → content
    files: RwLock<BTreeMap<String, String>>,
    failing_dirs: RwLock<HashMap<String, String>>,
    failing_downloads: RwLock<HashSet<String>>,
    latency: RwLock<Option<Duration>>,
    identity_calls: AtomicU64,
    list_calls: AtomicU64,
    fetch_calls: AtomicU64,
    save_calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryRemote {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            inner: Arc::new(MemoryInner {
                identity: RwLock::new(Some(owner.clone())),
                owner,
                repo: repo.into(),
                repository_exists: RwLock::new(true),
                files: RwLock::new(BTreeMap::new()),
                failing_dirs: RwLock::new(HashMap::new()),
                failing_downloads: RwLock::new(HashSet::new()),
                latency: RwLock::new(None),
                identity_calls: AtomicU64::new(0),
                list_calls: AtomicU64::new(0),
                fetch_calls: AtomicU64::new(0),
                save_calls: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    // ========================================================================
    // Setup and failure injection
    // ========================================================================

    /// Store a file at `path` (e.g. `skills/helper.md`).
    pub fn put(&self, path: impl Into<String>, content: impl Into<String>) {
        self.inner.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.inner.files.write().remove(path)
    }

    pub fn content_of(&self, path: &str) -> Option<String> {
        self.inner.files.read().get(path).cloned()
    }

    /// `None` simulates a missing or invalid credential.
    pub fn set_identity(&self, identity: Option<&str>) {
        *self.inner.identity.write() = identity.map(str::to_string);
    }

    pub fn set_repository_exists(&self, exists: bool) {
        *self.inner.repository_exists.write() = exists;
    }

    /// Make listing `dir` fail with a server error.
    pub fn fail_directory(&self, dir: impl Into<String>, message: impl Into<String>) {
        self.inner.failing_dirs.write().insert(dir.into(), message.into());
    }

    /// Make downloading `path` fail.
    pub fn fail_download(&self, path: impl Into<String>) {
        self.inner.failing_downloads.write().insert(path.into());
    }

    pub fn clear_failures(&self) {
        self.inner.failing_dirs.write().clear();
        self.inner.failing_downloads.write().clear();
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.write() = latency;
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn identity_calls(&self) -> u64 {
        self.inner.identity_calls.load(Ordering::Relaxed)
    }

    pub fn list_calls(&self) -> u64 {
        self.inner.list_calls.load(Ordering::Relaxed)
    }

    pub fn fetch_calls(&self) -> u64 {
        self.inner.fetch_calls.load(Ordering::Relaxed)
    }

    pub fn save_calls(&self) -> u64 {
        self.inner.save_calls.load(Ordering::Relaxed)
    }

    /// Highest number of `fetch_content` calls observed in flight at once.
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn download_url(&self, path: &str) -> String {
        format!("{URL_SCHEME}{}/{}/{path}", self.inner.owner, self.inner.repo)
    }

    fn html_url(&self, path: &str) -> String {
        format!("https://example.invalid/{}/{}/blob/main/{path}", self.inner.owner, self.inner.repo)
    }

    fn check_repo(&self, owner: &str, repo: &str) -> bool {
        *self.inner.repository_exists.read() && owner == self.inner.owner && repo == self.inner.repo
    }
}

// ============================================================================
// RemoteStore impl
// ============================================================================

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn authenticated_username(&self) -> Result<String> {
        self.inner.identity_calls.fetch_add(1, Ordering::Relaxed);
        self.inner
            .identity
            .read()
            .clone()
            .ok_or_else(|| Error::Authentication("no valid credential available".into()))
    }

    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool> {
        Ok(self.check_repo(owner, repo))
    }

    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RemoteFileInfo>> {
        self.inner.list_calls.fetch_add(1, Ordering::Relaxed);
        if !self.check_repo(owner, repo) {
            return Err(Error::NotFound(format!("repository {owner}/{repo}")));
        }
        if let Some(message) = self.inner.failing_dirs.read().get(path) {
            return Err(Error::Remote { status: Some(500), message: message.clone() });
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let listing: Vec<RemoteFileInfo> = self
            .inner
            .files
            .read()
            .iter()
            .filter_map(|(file_path, content)| {
                let name = file_path.strip_prefix(&prefix)?;
                if name.contains('/') {
                    return None;
                }
                Some(RemoteFileInfo {
                    name: name.to_string(),
                    kind: FileKind::File,
                    path: file_path.clone(),
                    sha: git_blob_sha(content),
                    size: content.len() as u64,
                    html_url: Some(self.html_url(file_path)),
                    download_url: Some(self.download_url(file_path)),
                })
            })
            .collect();

        if listing.is_empty() {
            return Err(Error::NotFound(format!("directory {path}")));
        }
        Ok(listing)
    }

    async fn fetch_content(&self, download_url: &str) -> Result<String> {
        self.inner.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.inner.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let result = (|| -> Result<String> {
            let prefix = format!("{URL_SCHEME}{}/{}/", self.inner.owner, self.inner.repo);
            let path = download_url
                .strip_prefix(&prefix)
                .ok_or_else(|| Error::NotFound(format!("url {download_url}")))?;
            if self.inner.failing_downloads.read().contains(path) {
                return Err(Error::Remote { status: Some(502), message: format!("download of {path} failed") });
            }
            self.inner
                .files
                .read()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("file {path}")))
        })();

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn latest_commit_sha(&self, _owner: &str, _repo: &str) -> Result<Option<String>> {
        let saves = self.inner.save_calls.load(Ordering::Relaxed);
        Ok(Some(git_blob_sha(&format!("commit-{saves}"))))
    }

    async fn save_element(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        _message: &str,
    ) -> Result<String> {
        if self.inner.identity.read().is_none() {
            return Err(Error::Authentication("no valid credential available".into()));
        }
        if !self.check_repo(owner, repo) {
            return Err(Error::RepositoryNotFound(format!("{owner}/{repo}")));
        }
        self.inner.save_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.files.write().insert(path.to_string(), content.to_string());
        Ok(self.html_url(path))
    }
}

// ============================================================================
// Tests
// ============================================================================
