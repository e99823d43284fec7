//! Version snapshots, comparison reports and sync plans.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::frontmatter;
use crate::hash::sha256_hex;
use crate::local::LocalElement;
use crate::model::ElementType;
use crate::remote::RemoteIndexEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    Local,
    Remote,
}

/// Immutable snapshot of one side of an element, for comparison only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionInfo {
    pub version: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
    /// SHA-256 of the full content.
    pub content_hash: String,
    pub size: u64,
    pub source: VersionSource,
}

impl VersionInfo {
    pub fn local(element: &LocalElement) -> Self {
        let header = frontmatter::parse_header(&element.content).unwrap_or_default();
        Self {
            version: header.version,
            timestamp: element.modified,
            author: header.author,
            content_hash: sha256_hex(&element.content),
            size: element.content.len() as u64,
            source: VersionSource::Local,
        }
    }

    /// Header fields from the content win over index metadata.
    pub fn remote(entry: &RemoteIndexEntry, content: &str) -> Self {
        let header = frontmatter::parse_header(content).unwrap_or_default();
        Self {
            version: header.version.or_else(|| entry.version.clone()),
            timestamp: entry.last_modified,
            author: header.author.or_else(|| entry.author.clone()),
            content_hash: sha256_hex(content),
            size: content.len() as u64,
            source: VersionSource::Remote,
        }
    }

    pub fn same_content(&self, other: &VersionInfo) -> bool {
        self.content_hash == other.content_hash
    }
}

// ============================================================================
// Compare
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Identical,
    Different,
    LocalOnly,
    RemoteOnly,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub name: String,
    pub element_type: ElementType,
    pub status: ComparisonStatus,
    pub local: Option<VersionInfo>,
    pub remote: Option<VersionInfo>,
    /// Only present when requested and the sides differ.
    pub diff: Option<String>,
}

// ============================================================================
// Plans
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStatus {
    New,
    Updated,
    Conflict,
    Unchanged,
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Download,
    Upload,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPlanItem {
    pub name: String,
    pub element_type: ElementType,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub status: PlanStatus,
    pub action: PlanAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictInfo {
    pub element: String,
    pub element_type: ElementType,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub local_modified: DateTime<Utc>,
    pub remote_modified: DateTime<Utc>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPlan {
    pub items: Vec<SyncPlanItem>,
    pub conflicts: Vec<ConflictInfo>,
}

impl SyncPlan {
    /// Items that would transfer content.
    pub fn actionable(&self) -> impl Iterator<Item = &SyncPlanItem> {
        self.items.iter().filter(|i| i.action != PlanAction::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn local_version_reads_header() {
        let el = LocalElement {
            path: PathBuf::from("skills/a.md"),
            content: "---\nname: A\nversion: 1.2\nauthor: octo\n---\nbody".into(),
            modified: Utc::now(),
        };
        let v = VersionInfo::local(&el);
        assert_eq!(v.version.as_deref(), Some("1.2"));
        assert_eq!(v.author.as_deref(), Some("octo"));
        assert_eq!(v.source, VersionSource::Local);
        assert_eq!(v.size, el.content.len() as u64);
    }

    #[test]
    fn headerless_content_still_hashes() {
        let el = LocalElement { path: PathBuf::new(), content: "plain".into(), modified: Utc::now() };
        let v = VersionInfo::local(&el);
        assert!(v.version.is_none());
        assert_eq!(v.content_hash, sha256_hex("plain"));
    }
}
