//! Bulk sync over one element type.
//!
//! A bulk call first returns a preview plan when `sync.bulk.require_preview`
//! is set and the caller has not confirmed. A confirmed call runs each item
//! through the single-element operation with its own confirmation bypassed.
//! Item failures are collected, never fatal, except authentication errors
//! which end the whole call.

use serde::Serialize;
use tracing::Instrument;

use super::version::{ConflictInfo, PlanAction, PlanStatus, SyncDirection, SyncPlan, SyncPlanItem};
use super::{Refusal, SyncOrchestrator, SyncOutcome};
use crate::frontmatter;
use crate::hash::git_blob_sha;
use crate::local::LocalStore;
use crate::model::ElementType;
use crate::remote::RemoteStore;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub skipped_up_to_date: Vec<String>,
    pub skipped_local_only: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped_up_to_date.len() + self.skipped_local_only.len() + self.failed.len()
    }

    fn fail(&mut self, name: &str, error: impl ToString) {
        self.failed.push(BulkFailure { name: name.to_string(), error: error.to_string() });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkOutcome {
    /// Nothing was done; this is what a confirmed call would do.
    Preview(SyncPlan),
    Executed(BulkReport),
    Refused { refusal: Refusal, message: String },
}

impl BulkOutcome {
    pub fn success(&self) -> bool {
        match self {
            BulkOutcome::Preview(_) => true,
            BulkOutcome::Executed(report) => report.success(),
            BulkOutcome::Refused { .. } => false,
        }
    }

    pub fn report(&self) -> Option<&BulkReport> {
        match self {
            BulkOutcome::Executed(report) => Some(report),
            _ => None,
        }
    }

    fn refused(refusal: Refusal, hint: &str) -> Self {
        let message = refusal.message_with(hint);
        BulkOutcome::Refused { refusal, message }
    }
}

impl<R: RemoteStore, L: LocalStore> SyncOrchestrator<R, L> {
    fn bulk_gate(&self, direction: SyncDirection) -> Option<BulkOutcome> {
        if !self.config.enabled {
            return Some(BulkOutcome::refused(
                Refusal::SyncDisabled,
                "Enable sync.enabled in the configuration to sync elements.",
            ));
        }
        match direction {
            SyncDirection::Download if !self.config.bulk.download_enabled => Some(BulkOutcome::refused(
                Refusal::BulkDownloadDisabled,
                "Enable sync.bulk.download_enabled to download many elements at once.",
            )),
            SyncDirection::Upload if !self.config.bulk.upload_enabled => Some(BulkOutcome::refused(
                Refusal::BulkUploadDisabled,
                "Enable sync.bulk.upload_enabled to upload many elements at once.",
            )),
            _ => None,
        }
    }

    // ========================================================================
    // Planning
    // ========================================================================

    /// What a bulk transfer of `element_type` would do. Compares git blob
    /// SHAs so no remote content is fetched.
    pub async fn plan(&self, direction: SyncDirection, element_type: ElementType) -> Result<SyncPlan> {
        let index = self.cache.get_index(false).await;
        let mut plan = SyncPlan::default();

        match direction {
            SyncDirection::Download => {
                for entry in index.entries(element_type) {
                    let stem = entry.file_stem();
                    let local = self.local.read(element_type, stem).await?;
                    let local_version = local
                        .as_ref()
                        .and_then(|l| frontmatter::parse_header(&l.content).ok())
                        .and_then(|h| h.version);

                    let (status, action) = match &local {
                        None => (PlanStatus::New, PlanAction::Download),
                        Some(l) if git_blob_sha(&l.content) == entry.content_hash => {
                            (PlanStatus::Unchanged, PlanAction::Skip)
                        }
                        Some(l) if l.modified > entry.last_modified => {
                            plan.conflicts.push(ConflictInfo {
                                element: stem.to_string(),
                                element_type,
                                local_version: local_version.clone(),
                                remote_version: entry.version.clone(),
                                local_modified: l.modified,
                                remote_modified: entry.last_modified,
                                resolution: Some("remote copy overwrites local changes".into()),
                            });
                            (PlanStatus::Conflict, PlanAction::Download)
                        }
                        Some(_) => (PlanStatus::Updated, PlanAction::Download),
                    };

                    plan.items.push(SyncPlanItem {
                        name: stem.to_string(),
                        element_type,
                        local_version,
                        remote_version: entry.version.clone(),
                        status,
                        action,
                    });
                }
            }
            SyncDirection::Upload => {
                for name in self.local.list(element_type).await? {
                    let Some(local) = self.local.read(element_type, &name).await? else {
                        continue;
                    };
                    let header = frontmatter::parse_header(&local.content).unwrap_or_default();
                    let entry = index.find(element_type, &name);

                    let (status, action) = match entry {
                        _ if header.is_local_only() => (PlanStatus::LocalOnly, PlanAction::Skip),
                        None => (PlanStatus::New, PlanAction::Upload),
                        Some(e) if git_blob_sha(&local.content) == e.content_hash => {
                            (PlanStatus::Unchanged, PlanAction::Skip)
                        }
                        Some(e) if e.last_modified > local.modified => {
                            plan.conflicts.push(ConflictInfo {
                                element: name.clone(),
                                element_type,
                                local_version: header.version.clone(),
                                remote_version: e.version.clone(),
                                local_modified: local.modified,
                                remote_modified: e.last_modified,
                                resolution: Some("local copy overwrites remote changes".into()),
                            });
                            (PlanStatus::Conflict, PlanAction::Upload)
                        }
                        Some(_) => (PlanStatus::Updated, PlanAction::Upload),
                    };

                    plan.items.push(SyncPlanItem {
                        name,
                        element_type,
                        local_version: header.version,
                        remote_version: entry.and_then(|e| e.version.clone()),
                        status,
                        action,
                    });
                }
            }
        }
        Ok(plan)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Download every remote element of `element_type`.
    pub async fn bulk_download(&self, element_type: ElementType, confirmed: bool) -> Result<BulkOutcome> {
        if let Some(refused) = self.bulk_gate(SyncDirection::Download) {
            return Ok(refused);
        }
        if self.config.bulk.require_preview && !confirmed {
            return Ok(BulkOutcome::Preview(self.plan(SyncDirection::Download, element_type).await?));
        }

        let span = tracing::info_span!("sync.bulk", direction = "download", element_type = %element_type);
        self.run_bulk_download(element_type).instrument(span).await
    }

    async fn run_bulk_download(&self, element_type: ElementType) -> Result<BulkOutcome> {
        let index = self.cache.get_index(false).await;
        let mut report = BulkReport::default();
        for entry in index.entries(element_type) {
            let name = entry.file_stem();
            match self.download_entry(entry, None, true).await {
                Ok(SyncOutcome::Applied { .. }) => report.succeeded.push(name.to_string()),
                Ok(SyncOutcome::UpToDate { .. }) => report.skipped_up_to_date.push(name.to_string()),
                Ok(other) => report.fail(name, other.message()),
                Err(e @ Error::Authentication(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(element = name, error = %e, "bulk download item failed");
                    report.fail(name, e);
                }
            }
        }
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk download finished"
        );
        Ok(BulkOutcome::Executed(report))
    }

    /// Upload every local element of `element_type`. Elements whose listing
    /// SHA already matches are skipped without a write.
    pub async fn bulk_upload(&self, element_type: ElementType, confirmed: bool) -> Result<BulkOutcome> {
        if let Some(refused) = self.bulk_gate(SyncDirection::Upload) {
            return Ok(refused);
        }
        if self.config.bulk.require_preview && !confirmed {
            return Ok(BulkOutcome::Preview(self.plan(SyncDirection::Upload, element_type).await?));
        }

        let span = tracing::info_span!("sync.bulk", direction = "upload", element_type = %element_type);
        self.run_bulk_upload(element_type).instrument(span).await
    }

    async fn run_bulk_upload(&self, element_type: ElementType) -> Result<BulkOutcome> {
        let index = self.cache.get_index(false).await;
        let mut report = BulkReport::default();
        for name in self.local.list(element_type).await? {
            let unchanged = match self.local.read(element_type, &name).await {
                Ok(Some(local)) => index
                    .find(element_type, &name)
                    .is_some_and(|e| e.content_hash == git_blob_sha(&local.content)),
                Ok(None) => false,
                Err(e) => {
                    report.fail(&name, e);
                    continue;
                }
            };
            if unchanged {
                report.skipped_up_to_date.push(name);
                continue;
            }

            match self.upload(&name, element_type, true).await {
                Ok(SyncOutcome::Applied { .. }) => report.succeeded.push(name),
                Ok(SyncOutcome::Refused { refusal: Refusal::LocalOnly, .. }) => report.skipped_local_only.push(name),
                Ok(other) => report.fail(&name, other.message()),
                Err(e @ Error::Authentication(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(element = %name, error = %e, "bulk upload item failed");
                    report.fail(&name, e);
                }
            }
        }
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk upload finished"
        );
        Ok(BulkOutcome::Executed(report))
    }
}
