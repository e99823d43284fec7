//! The cached listing of every remote element.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RateLimitInfo;
use crate::model::{ElementType, normalize_name};

/// One remote element file with listing (and optionally header) metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIndexEntry {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub element_type: ElementType,
    /// Listing SHA (git blob SHA).
    pub content_hash: String,
    pub url: String,
    pub download_url: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl RemoteIndexEntry {
    /// File name without directory or `.md` extension.
    pub fn file_stem(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.strip_suffix(".md").unwrap_or(file)
    }

    /// Exact match on the declared name or the file stem.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.file_stem() == name || self.file_stem() == normalize_name(name)
    }
}

/// Snapshot of the remote portfolio. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIndex {
    pub owner: String,
    pub repo_name: String,
    pub last_updated: DateTime<Utc>,
    pub elements: BTreeMap<ElementType, Vec<RemoteIndexEntry>>,
    pub total_elements: usize,
    pub latest_commit_sha: Option<String>,
    pub rate_limit_info: Option<RateLimitInfo>,
}

impl RemoteIndex {
    /// An index with no elements. Absence of data is a valid state.
    pub fn empty(owner: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo_name: repo_name.into(),
            last_updated: Utc::now(),
            elements: ElementType::ALL.into_iter().map(|t| (t, Vec::new())).collect(),
            total_elements: 0,
            latest_commit_sha: None,
            rate_limit_info: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_elements == 0
    }

    pub fn entries(&self, element_type: ElementType) -> &[RemoteIndexEntry] {
        self.elements.get(&element_type).map_or(&[], Vec::as_slice)
    }

    /// Lookup order: exact file stem, normalized file stem, declared name.
    pub fn find(&self, element_type: ElementType, name: &str) -> Option<&RemoteIndexEntry> {
        let entries = self.entries(element_type);
        let normalized = normalize_name(name);
        entries
            .iter()
            .find(|e| e.file_stem() == name)
            .or_else(|| entries.iter().find(|e| e.file_stem() == normalized))
            .or_else(|| entries.iter().find(|e| e.name == name))
    }

    /// Case-insensitive search over name, description and path.
    pub fn search(&self, query: &str) -> Vec<&RemoteIndexEntry> {
        let q = query.to_lowercase();
        self.elements
            .values()
            .flatten()
            .filter(|e| {
                e.name.to_lowercase().contains(&q)
                    || e.path.to_lowercase().contains(&q)
                    || e.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&q))
            })
            .collect()
    }
}
