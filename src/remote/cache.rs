//! Remote index cache.
//!
//! Holds a single [`RemoteIndex`] snapshot and decides when to refresh it:
//!
//! - no snapshot yet → fetch
//! - a mutating action happened within the grace period → fetch
//! - snapshot older than the TTL → fetch
//! - otherwise → serve the snapshot
//!
//! A failed fetch falls back to the stale snapshot, then to an empty
//! index; [`RemoteIndexCache::get_index`] never fails. Concurrent refreshes
//! are coalesced: callers that queued behind an in-flight fetch reuse its
//! result instead of issuing their own.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;

use super::{RemoteFileInfo, RemoteIndex, RemoteIndexEntry, RemoteStore};
use crate::config::CacheConfig;
use crate::frontmatter;
use crate::model::ElementType;
use crate::{Error, Result};

struct RecentAction {
    action: String,
    at: Instant,
}

#[derive(Default)]
struct CacheState {
    index: Option<Arc<RemoteIndex>>,
    last_fetch: Option<Instant>,
    recent_action: Option<RecentAction>,
}

/// Point-in-time view of the cache, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub has_cache: bool,
    pub age: Option<Duration>,
    pub total_elements: usize,
    pub is_stale: bool,
    pub recent_action: Option<String>,
}

pub struct RemoteIndexCache<R: RemoteStore> {
    remote: Arc<R>,
    repository: String,
    config: CacheConfig,
    state: RwLock<CacheState>,
    /// Serializes fetches; see `refresh`.
    fetch_lock: tokio::sync::Mutex<()>,
    /// Bumped after every successful fetch.
    generation: AtomicU64,
}

impl<R: RemoteStore> RemoteIndexCache<R> {
    pub fn new(remote: Arc<R>, repository: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            remote,
            repository: repository.into(),
            config,
            state: RwLock::new(CacheState::default()),
            fetch_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current index, refreshed as policy requires. Never fails.
    pub async fn get_index(&self, force: bool) -> Arc<RemoteIndex> {
        let observed = self.generation.load(Ordering::Acquire);
        if !force && !self.should_refresh() {
            if let Some(index) = self.cached() {
                return index;
            }
        }

        match self.refresh(observed).await {
            Ok(index) => index,
            Err(e) => match self.cached() {
                Some(stale) => {
                    tracing::warn!(error = %e, "remote index fetch failed; serving stale cache");
                    stale
                }
                None => {
                    tracing::warn!(error = %e, "remote index fetch failed; no cache available");
                    Arc::new(RemoteIndex::empty(String::new(), self.repository.clone()))
                }
            },
        }
    }

    /// The cached snapshot, fresh or not, without triggering a fetch.
    pub fn cached(&self) -> Option<Arc<RemoteIndex>> {
        self.state.read().index.clone()
    }

    pub fn should_refresh(&self) -> bool {
        let state = self.state.read();
        let (Some(_), Some(last_fetch)) = (&state.index, state.last_fetch) else {
            return true;
        };
        if let Some(action) = &state.recent_action {
            if action.at.elapsed() < self.config.action_grace() {
                return true;
            }
        }
        last_fetch.elapsed() >= self.config.ttl()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        let age = state.last_fetch.map(|t| t.elapsed());
        CacheStats {
            has_cache: state.index.is_some(),
            age,
            total_elements: state.index.as_ref().map_or(0, |i| i.total_elements),
            is_stale: age.is_none_or(|a| a >= self.config.ttl()),
            recent_action: state.recent_action.as_ref().map(|a| a.action.clone()),
        }
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Record a mutating action so the next read within the grace period
    /// refreshes. The snapshot itself stays readable.
    pub fn invalidate_after_action(&self, action: &str) {
        tracing::debug!(action, "remote index invalidated after action");
        self.state.write().recent_action = Some(RecentAction {
            action: action.to_string(),
            at: Instant::now(),
        });
    }

    /// Drop the snapshot entirely.
    pub fn clear(&self) {
        *self.state.write() = CacheState::default();
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetch and store a new snapshot, joining a fetch that completed after
    /// this caller observed generation `observed`.
    async fn refresh(&self, observed: u64) -> Result<Arc<RemoteIndex>> {
        let _guard = self.fetch_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(index) = self.cached() {
                tracing::debug!("joined concurrent remote index fetch");
                return Ok(index);
            }
        }

        let started = Instant::now();
        let index = Arc::new(self.fetch_fresh().await?);
        {
            let mut state = self.state.write();
            state.index = Some(index.clone());
            state.last_fetch = Some(Instant::now());
            // An action recorded mid-fetch may not be in this snapshot.
            if state.recent_action.as_ref().is_some_and(|a| a.at <= started) {
                state.recent_action = None;
            }
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(index)
    }

    /// Build a complete index from the remote store.
    ///
    /// Only identity resolution and the repository check can fail the
    /// whole fetch; per-type failures yield an empty list for that type.
    pub async fn fetch_fresh(&self) -> Result<RemoteIndex> {
        let span = tracing::info_span!("remote_index.fetch", repo = %self.repository);
        self.fetch_all().instrument(span).await
    }

    async fn fetch_all(&self) -> Result<RemoteIndex> {
        let started = Instant::now();
        let owner = self.timed(self.remote.authenticated_username()).await?;

        if !self.timed(self.remote.repository_exists(&owner, &self.repository)).await? {
            tracing::info!(owner = %owner, "remote portfolio does not exist yet");
            return Ok(RemoteIndex::empty(owner, self.repository.clone()));
        }

        let mut elements = BTreeMap::new();
        for element_type in ElementType::ALL {
            let entries = match self.fetch_type(&owner, element_type).await {
                Ok(entries) => entries,
                Err(Error::NotFound(_)) => {
                    tracing::debug!(element_type = %element_type, "no remote directory");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(element_type = %element_type, error = %e, "failed to index element type");
                    Vec::new()
                }
            };
            elements.insert(element_type, entries);
        }

        let latest_commit_sha = self
            .timed(self.remote.latest_commit_sha(&owner, &self.repository))
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "could not read latest commit");
                None
            });

        let total_elements: usize = elements.values().map(Vec::len).sum();
        tracing::info!(
            total_elements,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "remote index fetched"
        );

        Ok(RemoteIndex {
            owner,
            repo_name: self.repository.clone(),
            last_updated: Utc::now(),
            elements,
            total_elements,
            latest_commit_sha,
            rate_limit_info: self.remote.rate_limit(),
        })
    }

    /// Index one element type: list its directory, then fetch entries in
    /// capped batches with a delay between batches.
    async fn fetch_type(&self, owner: &str, element_type: ElementType) -> Result<Vec<RemoteIndexEntry>> {
        let listing = self
            .timed(self.remote.list_directory(owner, &self.repository, element_type.dir_name()))
            .await?;
        let files: Vec<RemoteFileInfo> = listing.into_iter().filter(RemoteFileInfo::is_element_file).collect();

        let mut entries = Vec::with_capacity(files.len());
        for (i, batch) in files.chunks(self.config.batch_size.max(1)).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
            let built = join_all(batch.iter().map(|f| self.create_entry(f, element_type))).await;
            entries.extend(built);
        }
        Ok(entries)
    }

    /// Entry from listing metadata, enriched from the file header when the
    /// file is small. Enrichment failures keep the listing defaults.
    pub async fn create_entry(&self, file: &RemoteFileInfo, element_type: ElementType) -> RemoteIndexEntry {
        let name = file.name.strip_suffix(".md").unwrap_or(&file.name).to_string();
        let mut entry = RemoteIndexEntry {
            path: file.path.clone(),
            name,
            description: None,
            version: None,
            author: None,
            element_type,
            content_hash: file.sha.clone(),
            url: file.html_url.clone().unwrap_or_default(),
            download_url: file.download_url.clone().unwrap_or_default(),
            last_modified: Utc::now(),
            size: file.size,
        };

        if file.size >= self.config.enrich_max_bytes || entry.download_url.is_empty() {
            return entry;
        }

        let header = self
            .timed(self.remote.fetch_content(&entry.download_url))
            .await
            .and_then(|content| frontmatter::parse_header(&content));
        match header {
            Ok(header) => {
                if let Some(name) = header.name.filter(|n| !n.trim().is_empty()) {
                    entry.name = name;
                }
                entry.description = header.description;
                entry.version = header.version;
                entry.author = header.author;
            }
            Err(e) => tracing::debug!(path = %file.path, error = %e, "header enrichment skipped"),
        }
        entry
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.config.request_timeout();
        tokio::time::timeout(limit, fut).await.map_err(|_| Error::Timeout(limit))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    fn cache(remote: &Arc<MemoryRemote>) -> RemoteIndexCache<MemoryRemote> {
        RemoteIndexCache::new(remote.clone(), "portfolio", CacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn serves_cache_within_ttl() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        remote.put("skills/a.md", "---\nname: A\n---\nbody");
        let cache = cache(&remote);

        let first = cache.get_index(false).await;
        let second = cache.get_index(false).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(remote.identity_calls(), 1);
        assert!(!cache.stats().is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_after_ttl() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        let cache = cache(&remote);
        let first = cache.get_index(false).await;
        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;
        assert!(cache.should_refresh());
        let second = cache.get_index(false).await;
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn action_within_grace_forces_refresh() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        let cache = cache(&remote);
        let first = cache.get_index(false).await;

        cache.invalidate_after_action("upload");
        assert!(cache.cached().is_some(), "invalidation keeps the snapshot");
        assert_eq!(cache.stats().recent_action.as_deref(), Some("upload"));

        let second = cache.get_index(false).await;
        assert!(!Arc::ptr_eq(&first, &second));
        let third = cache.get_index(false).await;
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test(start_paused = true)]
    async fn action_past_grace_falls_back_to_ttl() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        let cache = cache(&remote);
        cache.get_index(false).await;
        cache.invalidate_after_action("upload");
        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(!cache.should_refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn action_during_fetch_survives_it() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        remote.put("skills/a.md", "---\nname: A\n---\nbody");
        remote.set_latency(Some(Duration::from_secs(1)));
        let cache = Arc::new(cache(&remote));

        let fetch = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_index(false).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        cache.invalidate_after_action("upload");
        fetch.await.unwrap();

        assert!(cache.cached().is_some());
        assert_eq!(cache.stats().recent_action.as_deref(), Some("upload"));
        assert!(cache.should_refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_snapshot() {
        let remote = Arc::new(MemoryRemote::new("octo", "portfolio"));
        let cache = cache(&remote);
        cache.get_index(false).await;
        cache.clear();
        assert!(cache.cached().is_none());
        assert!(cache.should_refresh());
    }
}
