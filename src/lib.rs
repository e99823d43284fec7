//! # portfolio-sync: Element Portfolio Indexing and Sync Engine
//!
//! Keeps a portfolio of named, typed elements (personas, skills, templates,
//! agents, memories, ensembles) in step between a local directory and a
//! repository-backed remote, and derives a graph of semantic relationships
//! between them.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `RemoteStore` and `LocalStore` are the contracts with
//!    the outside world; the engine never talks HTTP or paths directly
//! 2. **Clean DTOs**: `ElementId`, `Relationship`, `RemoteIndexEntry` cross all boundaries
//! 3. **Parsing is total**: malformed stored relationships are data, not panics
//! 4. **Consent before writes**: refusals and previews never touch either store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portfolio_sync::{Config, ElementType, Portfolio};
//!
//! # async fn example() -> portfolio_sync::Result<()> {
//! let mut config = Config::default();
//! config.sync.enabled = true;
//!
//! let portfolio = Portfolio::open_memory("octo", config);
//! portfolio.remote().put("skills/helper.md", "---\nname: Helper\n---\nHelps.");
//!
//! let outcome = portfolio.sync().download("helper", ElementType::Skills, None, false).await?;
//! println!("{}", outcome.message());
//! # Ok(())
//! # }
//! ```
//!
//! ## Remote Stores
//!
//! | Store | Feature | Description |
//! |-------|---------|-------------|
//! | Memory | (default) | In-process remote for testing/embedding |
//! | GitHub | `github` | GitHub contents API via reqwest |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod frontmatter;
pub mod validate;
pub mod hash;
pub mod graph;
pub mod remote;
pub mod local;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ElementId, ElementIdError, ElementType, IndexedElement,
    Relationship, RelationshipType, ParsedRelationship,
    RelationshipPath, Hop, normalize_name,
};

// ============================================================================
// Re-exports: Graph
// ============================================================================

pub use graph::{
    RelationshipGraph, GraphStats, InvalidReport, DiscoveryReport,
    TraversalOptions, deduplicate,
};

// ============================================================================
// Re-exports: Remote, local and sync
// ============================================================================

pub use config::Config;
pub use remote::{RemoteStore, RemoteIndex, RemoteIndexEntry, RemoteIndexCache, MemoryRemote};
pub use local::{LocalStore, FsLocalStore};
pub use sync::{
    SyncOrchestrator, SyncOutcome, Refusal, CompareOutcome,
    BulkOutcome, BulkReport, SyncDirection,
};
pub use validate::{ContentValidator, Severity, ValidationReport};

// ============================================================================
// Top-level Portfolio handle
// ============================================================================

/// The primary entry point. Composes one remote index cache, the sync
/// orchestrator over it, and relationship indexing of the local portfolio.
pub struct Portfolio<R: RemoteStore, L: LocalStore> {
    config: Config,
    remote: Arc<R>,
    sync: SyncOrchestrator<R, L>,
}

impl<R: RemoteStore, L: LocalStore> Portfolio<R, L> {
    pub fn new(config: Config, remote: Arc<R>, local: Arc<L>) -> Self {
        let cache = Arc::new(RemoteIndexCache::new(
            remote.clone(),
            config.portfolio.repository.clone(),
            config.cache.clone(),
        ));
        let sync = SyncOrchestrator::new(cache, local, config.sync.clone());
        Self { config, remote, sync }
    }

    /// Replace the pass-through content validator.
    pub fn with_validator(mut self, validator: Arc<dyn ContentValidator>) -> Self {
        self.sync = self.sync.with_validator(validator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn local(&self) -> &Arc<L> {
        self.sync.local()
    }

    pub fn cache(&self) -> &Arc<RemoteIndexCache<R>> {
        self.sync.cache()
    }

    pub fn sync(&self) -> &SyncOrchestrator<R, L> {
        &self.sync
    }

    /// Build a relationship graph from every local element and run a
    /// discovery pass over it. Unreadable elements are skipped.
    pub async fn index_local(&self) -> Result<(RelationshipGraph, DiscoveryReport)> {
        let mut graph = RelationshipGraph::new(self.config.relationships.clone());
        let local = self.sync.local();

        for element_type in ElementType::ALL {
            for name in local.list(element_type).await? {
                let Some(file) = local.read(element_type, &name).await? else {
                    continue;
                };
                let id = match ElementId::new(element_type.dir_name(), name.as_str()) {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!(element = %name, error = %e, "skipping element with unusable name");
                        continue;
                    }
                };
                let header = match frontmatter::parse_header(&file.content) {
                    Ok(header) => header,
                    Err(e) => {
                        tracing::warn!(element = %id, error = %e, "skipping element with malformed header");
                        continue;
                    }
                };
                let mut element = IndexedElement::new(header.name.clone().unwrap_or_else(|| name.clone()))
                    .with_description(header.description.clone().unwrap_or_default())
                    .with_keywords(header.keywords.clone())
                    .with_tags(header.tags.clone());
                for (key, text) in header.custom_text() {
                    element = element.with_custom(key, text);
                }
                graph.insert_element(id, element);
            }
        }

        let report = graph.discover_all();
        tracing::info!(elements = graph.len(), added = report.added, "indexed local portfolio");
        Ok((graph, report))
    }
}

/// In-memory remote for testing and embedding, local files under
/// `config.portfolio.root`.
impl Portfolio<MemoryRemote, FsLocalStore> {
    pub fn open_memory(owner: &str, config: Config) -> Self {
        let remote = Arc::new(MemoryRemote::new(owner, config.portfolio.repository.clone()));
        let local = Arc::new(FsLocalStore::new(config.portfolio.root.clone()));
        Self::new(config, remote, local)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid element id: {0}")]
    InvalidElementId(#[from] ElementIdError),

    #[error("Invalid element type: {0}")]
    InvalidElementType(String),

    #[error("Invalid element name: {0:?}")]
    InvalidElementName(String),

    #[error("Invalid relationship type: {0}")]
    InvalidRelationshipType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed element header: {0}")]
    Frontmatter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
