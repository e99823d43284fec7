//! # Sync Orchestrator
//!
//! Reconciles single elements, or whole element types, between the local
//! portfolio and the remote one.
//!
//! | Operation | Gate | Writes |
//! |-----------|------|--------|
//! | `download` | `sync.enabled` | local file, unless up to date or pending |
//! | `upload` | `sync.enabled`, local-only veto, validation, secrets | remote file, unless pending |
//! | `compare` | `sync.enabled` | nothing |
//! | `list_remote` | none | nothing |
//! | `bulk_download` / `bulk_upload` | `sync.enabled` + bulk direction | per item, after preview |
//!
//! Every refusal and every pending confirmation happens before any write.
//! The orchestrator never mutates the remote index; it reads it and, after
//! an upload, marks it for refresh.

pub mod bulk;
pub mod diff;
pub mod outcome;
pub mod version;

use std::sync::Arc;

use serde::Serialize;

use crate::config::SyncConfig;
use crate::frontmatter;
use crate::hash::sha256_hex;
use crate::local::{LocalStore, file_stem};
use crate::model::ElementType;
use crate::remote::{RemoteIndexCache, RemoteIndexEntry, RemoteStore};
use crate::validate::{ContentValidator, PassthroughValidator, SecretScanner};
use crate::{Error, Result};

pub use bulk::{BulkFailure, BulkOutcome, BulkReport};
pub use outcome::{Refusal, SyncOutcome};
pub use version::{
    ComparisonReport, ComparisonStatus, ConflictInfo, PlanAction, PlanStatus, SyncDirection, SyncPlan,
    SyncPlanItem, VersionInfo, VersionSource,
};

const PREVIEW_LINES: usize = 20;

/// Result of [`SyncOrchestrator::compare`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompareOutcome {
    Compared(ComparisonReport),
    Refused(SyncOutcome),
}

impl CompareOutcome {
    pub fn report(&self) -> Option<&ComparisonReport> {
        match self {
            CompareOutcome::Compared(report) => Some(report),
            CompareOutcome::Refused(_) => None,
        }
    }
}

pub struct SyncOrchestrator<R: RemoteStore, L: LocalStore> {
    cache: Arc<RemoteIndexCache<R>>,
    local: Arc<L>,
    validator: Arc<dyn ContentValidator>,
    scanner: SecretScanner,
    config: SyncConfig,
}

impl<R: RemoteStore, L: LocalStore> SyncOrchestrator<R, L> {
    pub fn new(cache: Arc<RemoteIndexCache<R>>, local: Arc<L>, config: SyncConfig) -> Self {
        Self {
            cache,
            local,
            validator: Arc::new(PassthroughValidator),
            scanner: SecretScanner,
            config,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ContentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn cache(&self) -> &Arc<RemoteIndexCache<R>> {
        &self.cache
    }

    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn gate(&self) -> Option<SyncOutcome> {
        (!self.config.enabled).then(|| {
            SyncOutcome::refused(Refusal::SyncDisabled, "Enable sync.enabled in the configuration to sync elements.")
        })
    }

    async fn find_remote(&self, element_type: ElementType, name: &str) -> Option<RemoteIndexEntry> {
        self.cache.get_index(false).await.find(element_type, name).cloned()
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Copy a remote element into the local portfolio.
    ///
    /// `version`, when given, must match the version the remote declares.
    /// `force` skips the confirmation step for a differing local copy.
    pub async fn download(
        &self,
        name: &str,
        element_type: ElementType,
        version: Option<&str>,
        force: bool,
    ) -> Result<SyncOutcome> {
        if let Some(refused) = self.gate() {
            return Ok(refused);
        }

        let Some(entry) = self.find_remote(element_type, name).await else {
            return Ok(SyncOutcome::NotFound {
                message: format!("{} '{name}' not found in the remote portfolio", element_type.singular()),
            });
        };
        self.download_entry(&entry, version, force).await
    }

    /// [`download`](Self::download) for an already resolved index entry.
    /// The local copy is the one at the entry's file stem.
    pub async fn download_entry(
        &self,
        entry: &RemoteIndexEntry,
        version: Option<&str>,
        force: bool,
    ) -> Result<SyncOutcome> {
        if let Some(refused) = self.gate() {
            return Ok(refused);
        }
        let element_type = entry.element_type;

        if let Some(requested) = version {
            if entry.version.as_deref() != Some(requested) {
                return Ok(SyncOutcome::refused(
                    Refusal::VersionUnavailable { requested: requested.to_string(), available: entry.version.clone() },
                    "Only the current remote version can be downloaded.",
                ));
            }
        }

        let remote_content = self.cache.remote().fetch_content(&entry.download_url).await?;
        let stem = entry.file_stem();

        if let Some(local) = self.local.read(element_type, stem).await? {
            if sha256_hex(&local.content) == sha256_hex(&remote_content) {
                return Ok(SyncOutcome::UpToDate {
                    message: format!("{} '{}' is already up to date", element_type.singular(), entry.name),
                });
            }
            if self.config.individual.require_confirmation && !force {
                return Ok(SyncOutcome::PendingConfirmation {
                    message: format!(
                        "Local {} '{}' differs from the remote copy. Repeat with force to overwrite it.",
                        element_type.singular(),
                        entry.name
                    ),
                    preview: diff::line_diff(&local.content, &remote_content),
                });
            }
        }

        let report = self.validator.validate(&remote_content, element_type);
        if report.is_critical() {
            tracing::warn!(element = %entry.path, patterns = ?report.detected_patterns, "download blocked by validation");
            return Ok(SyncOutcome::refused(
                Refusal::CriticalContent { patterns: report.detected_patterns },
                "The remote content was not written.",
            ));
        }

        let path = self.local.write(element_type, stem, &report.content).await?;
        tracing::info!(element = %entry.path, path = %path.display(), "downloaded element");
        Ok(SyncOutcome::Applied {
            message: format!("Downloaded {} '{}'", element_type.singular(), entry.name),
            location: path.display().to_string(),
        })
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Publish a local element to the remote portfolio.
    pub async fn upload(&self, name: &str, element_type: ElementType, confirm: bool) -> Result<SyncOutcome> {
        if let Some(refused) = self.gate() {
            return Ok(refused);
        }

        let Some(local) = self.local.read(element_type, name).await? else {
            return Ok(SyncOutcome::NotFound {
                message: format!("{} '{name}' not found in the local portfolio", element_type.singular()),
            });
        };

        let header = frontmatter::parse_header(&local.content)?;
        if header.is_local_only() {
            return Ok(SyncOutcome::refused(
                Refusal::LocalOnly,
                "Remove privacy.local_only from the element to allow uploading it.",
            ));
        }

        let report = self.validator.validate(&local.content, element_type);
        if report.is_critical() {
            tracing::warn!(element = name, patterns = ?report.detected_patterns, "upload blocked by validation");
            return Ok(SyncOutcome::refused(
                Refusal::CriticalContent { patterns: report.detected_patterns },
                "Nothing was uploaded.",
            ));
        }

        if self.config.privacy.scan_for_secrets {
            let found = self.scanner.scan(&report.content);
            if !found.is_empty() {
                tracing::warn!(element = name, patterns = ?found, "upload blocked by secret scan");
                return Ok(SyncOutcome::refused(
                    Refusal::SecretsDetected { patterns: found.into_iter().map(str::to_string).collect() },
                    "Remove the credentials from the element before uploading.",
                ));
            }
        }

        let stem = file_stem(name)?;
        let remote_path = format!("{}/{stem}.md", element_type.dir_name());

        if self.config.individual.require_confirmation && !confirm {
            return Ok(SyncOutcome::PendingConfirmation {
                message: format!("Upload {remote_path} to the remote portfolio? Repeat with confirm to proceed."),
                preview: diff::head(&report.content, PREVIEW_LINES),
            });
        }

        let remote = self.cache.remote();
        let owner = remote.authenticated_username().await?;
        let commit_message = format!("Update {} {stem}", element_type.singular());
        let saved = remote
            .save_element(&owner, self.cache.repository(), &remote_path, &report.content, &commit_message)
            .await;

        match saved {
            Ok(url) => {
                self.cache.invalidate_after_action("upload");
                tracing::info!(element = %remote_path, url = %url, "uploaded element");
                Ok(SyncOutcome::Applied {
                    message: format!("Uploaded {} '{stem}'", element_type.singular()),
                    location: url,
                })
            }
            Err(Error::RepositoryNotFound(repo)) => Ok(SyncOutcome::refused(
                Refusal::RepositoryMissing,
                &format!("Initialize the portfolio repository {repo} first, then retry the upload."),
            )),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Compare and list
    // ========================================================================

    /// Compare the local and remote copies. The diff is only built when
    /// `show_diff` is set and the copies differ.
    pub async fn compare(&self, name: &str, element_type: ElementType, show_diff: bool) -> Result<CompareOutcome> {
        if let Some(refused) = self.gate() {
            return Ok(CompareOutcome::Refused(refused));
        }

        let entry = self.find_remote(element_type, name).await;
        let local_name = entry.as_ref().map_or(name, RemoteIndexEntry::file_stem);
        let local = self.local.read(element_type, local_name).await?;

        let remote_content = match &entry {
            Some(entry) => Some(self.cache.remote().fetch_content(&entry.download_url).await?),
            None => None,
        };

        let local_version = local.as_ref().map(VersionInfo::local);
        let remote_version = entry.as_ref().zip(remote_content.as_deref()).map(|(e, c)| VersionInfo::remote(e, c));

        let status = match (&local_version, &remote_version) {
            (Some(l), Some(r)) if l.same_content(r) => ComparisonStatus::Identical,
            (Some(_), Some(_)) => ComparisonStatus::Different,
            (Some(_), None) => ComparisonStatus::LocalOnly,
            (None, Some(_)) => ComparisonStatus::RemoteOnly,
            (None, None) => ComparisonStatus::NotFound,
        };

        let diff = match (&local, &remote_content) {
            (Some(l), Some(r)) if show_diff && status == ComparisonStatus::Different => {
                Some(diff::line_diff(&l.content, r))
            }
            _ => None,
        };

        Ok(CompareOutcome::Compared(ComparisonReport {
            name: name.to_string(),
            element_type,
            status,
            local: local_version,
            remote: remote_version,
            diff,
        }))
    }

    /// Remote elements, optionally of one type. Allowed with sync disabled.
    pub async fn list_remote(&self, element_type: Option<ElementType>) -> Vec<RemoteIndexEntry> {
        let index = self.cache.get_index(false).await;
        match element_type {
            Some(t) => index.entries(t).to_vec(),
            None => index.elements.values().flatten().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::local::FsLocalStore;
    use crate::remote::MemoryRemote;

    fn orchestrator(
        remote: &MemoryRemote,
        root: &std::path::Path,
        config: SyncConfig,
    ) -> SyncOrchestrator<MemoryRemote, FsLocalStore> {
        let cache = Arc::new(RemoteIndexCache::new(Arc::new(remote.clone()), "portfolio", CacheConfig::default()));
        SyncOrchestrator::new(cache, Arc::new(FsLocalStore::new(root)), config)
    }

    fn enabled() -> SyncConfig {
        SyncConfig { enabled: true, ..SyncConfig::default() }
    }

    #[tokio::test]
    async fn download_writes_new_element() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        remote.put("skills/helper.md", "---\nname: Helper\nversion: 2\n---\nbody");
        let sync = orchestrator(&remote, dir.path(), enabled());

        let out = sync.download("Helper", ElementType::Skills, None, false).await.unwrap();
        assert!(out.is_applied(), "{out:?}");
        let written = std::fs::read_to_string(dir.path().join("skills/helper.md")).unwrap();
        assert!(written.ends_with("body"));

        let again = sync.download("helper", ElementType::Skills, None, false).await.unwrap();
        assert!(matches!(again, SyncOutcome::UpToDate { .. }));
    }

    #[tokio::test]
    async fn download_of_differing_copy_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        remote.put("skills/helper.md", "remote\n");
        std::fs::create_dir_all(dir.path().join("skills")).unwrap();
        std::fs::write(dir.path().join("skills/helper.md"), "local\n").unwrap();
        let sync = orchestrator(&remote, dir.path(), enabled());

        let out = sync.download("helper", ElementType::Skills, None, false).await.unwrap();
        let SyncOutcome::PendingConfirmation { preview, .. } = out else { panic!("{out:?}") };
        assert!(preview.contains("- local") && preview.contains("+ remote"));
        assert_eq!(std::fs::read_to_string(dir.path().join("skills/helper.md")).unwrap(), "local\n");

        let forced = sync.download("helper", ElementType::Skills, None, true).await.unwrap();
        assert!(forced.is_applied());
        assert_eq!(std::fs::read_to_string(dir.path().join("skills/helper.md")).unwrap(), "remote\n");
    }

    #[tokio::test]
    async fn download_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        remote.put("skills/helper.md", "---\nversion: 1.0.0\n---\n");
        let sync = orchestrator(&remote, dir.path(), enabled());

        let out = sync.download("helper", ElementType::Skills, Some("0.9.0"), true).await.unwrap();
        assert!(matches!(out.refusal(), Some(Refusal::VersionUnavailable { .. })));
        let ok = sync.download("helper", ElementType::Skills, Some("1.0.0"), true).await.unwrap();
        assert!(ok.is_applied());
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        let sync = orchestrator(&remote, dir.path(), enabled());

        let out = sync.download("ghost", ElementType::Agents, None, false).await.unwrap();
        assert!(matches!(out, SyncOutcome::NotFound { .. }));
        let out = sync.upload("ghost", ElementType::Agents, true).await.unwrap();
        assert!(matches!(out, SyncOutcome::NotFound { .. }));
        let cmp = sync.compare("ghost", ElementType::Agents, true).await.unwrap();
        assert_eq!(cmp.report().unwrap().status, ComparisonStatus::NotFound);
    }

    #[tokio::test]
    async fn upload_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        let sync = orchestrator(&remote, dir.path(), enabled());
        sync.local().write(ElementType::Templates, "report", "# Report\n").await.unwrap();

        sync.cache().get_index(false).await;
        let out = sync.upload("report", ElementType::Templates, true).await.unwrap();
        assert!(out.is_applied(), "{out:?}");
        assert_eq!(remote.content_of("templates/report.md").as_deref(), Some("# Report\n"));
        assert_eq!(sync.cache().stats().recent_action.as_deref(), Some("upload"));

        let listed = sync.list_remote(Some(ElementType::Templates)).await;
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn upload_propagates_authentication_failure() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("octo", "portfolio");
        let sync = orchestrator(&remote, dir.path(), enabled());
        sync.local().write(ElementType::Skills, "a", "text").await.unwrap();
        remote.set_identity(None);

        let err = sync.upload("a", ElementType::Skills, true).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
