//! # Local Store Boundary
//!
//! One file per element at `<root>/<type>/<name>.md`. Writes use the
//! normalized element name as the file stem (see
//! [`crate::model::normalize_name`]); reads also find files whose stem is
//! the listed name verbatim.

pub mod fs;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{ElementType, normalize_name};
use crate::{Error, Result};

pub use fs::FsLocalStore;

/// A local element file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalElement {
    pub path: PathBuf,
    pub content: String,
    pub modified: DateTime<Utc>,
}

#[async_trait]
pub trait LocalStore: Send + Sync + 'static {
    /// Where `name` of `element_type` lives (whether or not it exists).
    fn element_path(&self, element_type: ElementType, name: &str) -> Result<PathBuf>;

    /// Read an element; `None` when there is no local copy.
    async fn read(&self, element_type: ElementType, name: &str) -> Result<Option<LocalElement>>;

    /// Write an element atomically, creating parent directories.
    async fn write(&self, element_type: ElementType, name: &str, content: &str) -> Result<PathBuf>;

    /// File stems of every element of `element_type`, sorted.
    async fn list(&self, element_type: ElementType) -> Result<Vec<String>>;
}

/// File stem for an element name. Rejects names that would escape the
/// type directory.
pub fn file_stem(name: &str) -> Result<String> {
    let stem = normalize_name(name);
    let stem = stem.strip_suffix(".md").unwrap_or(&stem).to_string();
    if stem.is_empty() || stem.starts_with('.') || stem.contains(['/', '\\']) || stem.contains('\0') {
        return Err(Error::InvalidElementName(name.to_string()));
    }
    Ok(stem)
}

/// A stem exactly as given, for files whose on-disk name was never
/// normalized (`Code Review.md`). Same path-safety rules as [`file_stem`].
pub fn verbatim_stem(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let unsafe_stem =
        stem.trim().is_empty() || stem.starts_with('.') || stem.contains(['/', '\\']) || stem.contains('\0');
    (!unsafe_stem).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_normalized_and_safe() {
        assert_eq!(file_stem("Code Review").unwrap(), "code-review");
        assert_eq!(file_stem("helper.md").unwrap(), "helper");
        for bad in ["", "../etc/passwd", "a/b", ".hidden", "a\\b"] {
            assert!(file_stem(bad).is_err(), "{bad}");
            assert!(verbatim_stem(bad).is_none(), "{bad}");
        }
        assert_eq!(verbatim_stem("Code Review"), Some("Code Review"));
    }
}
