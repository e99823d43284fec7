//! Filesystem-backed local store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{LocalElement, LocalStore, file_stem, verbatim_stem};
use crate::Result;
use crate::model::ElementType;

const EXTENSION: &str = "md";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FsLocalStore {
    root: PathBuf,
}

impl FsLocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, element_type: ElementType) -> PathBuf {
        self.root.join(element_type.dir_name())
    }
}

#[async_trait]
impl LocalStore for FsLocalStore {
    fn element_path(&self, element_type: ElementType, name: &str) -> Result<PathBuf> {
        let stem = file_stem(name)?;
        Ok(self.type_dir(element_type).join(format!("{stem}.{EXTENSION}")))
    }

    async fn read(&self, element_type: ElementType, name: &str) -> Result<Option<LocalElement>> {
        let path = self.element_path(element_type, name)?;
        if let Some(element) = read_file(path.clone()).await? {
            return Ok(Some(element));
        }
        match verbatim_stem(name) {
            Some(stem) => {
                let listed = self.type_dir(element_type).join(format!("{stem}.{EXTENSION}"));
                if listed == path { Ok(None) } else { read_file(listed).await }
            }
            None => Ok(None),
        }
    }

    async fn write(&self, element_type: ElementType, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.element_path(element_type, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension(format!(
            "{EXTENSION}.tmp-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote local element");
        Ok(path)
    }

    async fn list(&self, element_type: ElementType) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.type_dir(element_type)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

async fn read_file(path: PathBuf) -> Result<Option<LocalElement>> {
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let modified = tokio::fs::metadata(&path)
        .await?
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(Some(LocalElement { path, content, modified }))
}
