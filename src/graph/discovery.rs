//! Relationship discovery from element text.
//!
//! Two sources of candidate edges:
//!
//! 1. **Patterns**: an ordered table of `{type, regex, confidence}`. Each
//!    capture is resolved to a known element (exact normalized name, then
//!    substring either way, then display name).
//! 2. **Action verbs**: elements sharing a verb stem are related by the
//!    verb's category, at 0.7 × [`VERB_MATCH_CONFIDENCE`].
//!
//! Matching uses the `regex` crate, which runs in linear time in the input
//! length; corpus text is additionally capped at [`MAX_CORPUS_CHARS`].

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{RelationshipGraph, deduplicate};
use crate::model::*;
use crate::{Error, Result};

pub const MAX_CORPUS_CHARS: usize = 10_000;

/// Base confidence of a shared-verb match.
pub const VERB_MATCH_CONFIDENCE: f64 = 0.9;

/// Verb-derived edges are discounted by this factor.
pub const VERB_DISCOUNT: f64 = 0.7;

/// Captured tokens shorter than this never resolve.
const MIN_TOKEN_LEN: usize = 3;

// ============================================================================
// Pattern table
// ============================================================================

#[derive(Debug, Clone)]
pub struct DiscoveryPattern {
    pub relationship: RelationshipType,
    pub regex: Regex,
    pub confidence: f64,
}

const TARGET: &str = r"(?:the\s+)?([A-Za-z0-9][\w.-]*)";

static PATTERNS: LazyLock<Vec<DiscoveryPattern>> = LazyLock::new(|| {
    let table: [(RelationshipType, &str, f64); 11] = [
        (RelationshipType::Requires, r"\brequires?\s+", 0.85),
        (RelationshipType::DependsOn, r"\bdepends\s+on\s+", 0.85),
        (RelationshipType::Extends, r"\b(?:extends|builds\s+on|based\s+on)\s+", 0.85),
        (RelationshipType::Uses, r"\buses?\s+", 0.8),
        (RelationshipType::PrerequisiteFor, r"\bprerequisite\s+for\s+", 0.8),
        (RelationshipType::HelpsDebug, r"\bhelps?\s+debug(?:ging)?\s+", 0.75),
        (RelationshipType::Complements, r"\b(?:complements|works\s+well\s+with|pairs\s+with)\s+", 0.75),
        (RelationshipType::Supports, r"\bsupports\s+", 0.7),
        (RelationshipType::Contains, r"\b(?:contains|includes)\s+", 0.7),
        (RelationshipType::SimilarTo, r"\b(?:similar\s+to|alternative\s+to)\s+", 0.7),
        (RelationshipType::Contradicts, r"\b(?:contradicts|conflicts\s+with)\s+", 0.7),
    ];
    table
        .into_iter()
        .map(|(relationship, prefix, confidence)| DiscoveryPattern {
            relationship,
            regex: Regex::new(&format!("(?i){prefix}{TARGET}")).expect("static discovery pattern"),
            confidence,
        })
        .collect()
});

/// The built-in pattern table, in match order.
pub fn default_patterns() -> &'static [DiscoveryPattern] {
    &PATTERNS
}

// ============================================================================
// Verb table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VerbCategory {
    Debugging,
    Creation,
    Explanation,
    Analysis,
    Other,
}

impl VerbCategory {
    pub fn relationship(self) -> RelationshipType {
        match self {
            VerbCategory::Debugging => RelationshipType::HelpsDebug,
            VerbCategory::Creation => RelationshipType::Complements,
            VerbCategory::Explanation => RelationshipType::Supports,
            VerbCategory::Analysis => RelationshipType::Complements,
            VerbCategory::Other => RelationshipType::SimilarTo,
        }
    }
}

/// Verb stems matched as word prefixes ("debug" matches "debugging").
const VERBS: &[(&str, VerbCategory)] = &[
    ("debug", VerbCategory::Debugging),
    ("troubleshoot", VerbCategory::Debugging),
    ("diagnos", VerbCategory::Debugging),
    ("fix", VerbCategory::Debugging),
    ("creat", VerbCategory::Creation),
    ("generat", VerbCategory::Creation),
    ("build", VerbCategory::Creation),
    ("writ", VerbCategory::Creation),
    ("design", VerbCategory::Creation),
    ("expla", VerbCategory::Explanation),
    ("teach", VerbCategory::Explanation),
    ("describ", VerbCategory::Explanation),
    ("document", VerbCategory::Explanation),
    ("analy", VerbCategory::Analysis),
    ("review", VerbCategory::Analysis),
    ("evaluat", VerbCategory::Analysis),
    ("audit", VerbCategory::Analysis),
    ("test", VerbCategory::Other),
    ("optimi", VerbCategory::Other),
    ("manag", VerbCategory::Other),
];

fn verbs_in(text: &str) -> BTreeSet<(&'static str, VerbCategory)> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .flat_map(|word| {
            VERBS
                .iter()
                .filter(move |(stem, _)| word.starts_with(stem))
                .copied()
                .collect::<Vec<_>>()
        })
        .collect()
}

fn capped(text: &str) -> &str {
    match text.char_indices().nth(MAX_CORPUS_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub processed: usize,
    pub added: usize,
    pub inverses_added: usize,
    /// Elements whose discovery failed; the pass continued past them.
    pub failed: Vec<ElementId>,
    /// True when the wall-clock budget ran out before every element was seen.
    pub timed_out: bool,
}

// ============================================================================
// Discovery
// ============================================================================

impl RelationshipGraph {
    /// Discover relationships for one element using the built-in patterns.
    pub fn discover(&self, id: &ElementId) -> Result<Vec<Relationship>> {
        self.discover_with(id, default_patterns())
    }

    /// Discover relationships for one element with a custom pattern table.
    ///
    /// Results are deduplicated per target, filtered by minimum confidence,
    /// sorted strongest first and capped per element.
    pub fn discover_with(&self, id: &ElementId, patterns: &[DiscoveryPattern]) -> Result<Vec<Relationship>> {
        let element = self
            .elements
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("element {id}")))?;
        let corpus = element.corpus(id);
        let corpus = capped(&corpus);

        let mut candidates = Vec::new();

        for pattern in patterns {
            for caps in pattern.regex.captures_iter(corpus) {
                let Some(token) = caps.get(1) else { continue };
                if let Some(target) = self.resolve(token.as_str(), id) {
                    candidates.push(
                        Relationship::new(target, pattern.relationship, pattern.confidence)
                            .with_metadata("source", "pattern")
                            .with_metadata("matched", caps.get(0).map_or("", |m| m.as_str())),
                    );
                }
            }
        }

        let own_verbs = verbs_in(corpus);
        if !own_verbs.is_empty() {
            for (other_id, other) in &self.elements {
                if other_id == id {
                    continue;
                }
                let other_corpus = other.corpus(other_id);
                let shared = verbs_in(capped(&other_corpus));
                for (stem, category) in own_verbs.intersection(&shared) {
                    candidates.push(
                        Relationship::new(
                            other_id,
                            category.relationship(),
                            VERB_MATCH_CONFIDENCE * VERB_DISCOUNT,
                        )
                        .with_metadata("source", "verb")
                        .with_metadata("verb", *stem),
                    );
                }
            }
        }

        let mut found: Vec<Relationship> = deduplicate(candidates)
            .into_iter()
            .filter(|r| r.effective_strength() >= self.config.min_confidence)
            .collect();
        found.sort_by(|a, b| b.effective_strength().total_cmp(&a.effective_strength()));
        found.truncate(self.config.max_per_element);

        tracing::trace!(element = %id, count = found.len(), "discovered relationships");
        Ok(found)
    }

    /// Resolve a captured token to an indexed element other than `exclude`.
    fn resolve(&self, token: &str, exclude: &ElementId) -> Option<&ElementId> {
        let wanted = normalize_name(token);
        if wanted.len() < MIN_TOKEN_LEN {
            return None;
        }
        let candidates = || self.elements.iter().filter(move |(id, _)| *id != exclude);

        candidates()
            .find(|(id, _)| normalize_name(id.name()) == wanted)
            .or_else(|| {
                candidates().find(|(id, _)| {
                    let name = normalize_name(id.name());
                    name.len() >= MIN_TOKEN_LEN && (name.contains(&wanted) || wanted.contains(&name))
                })
            })
            .or_else(|| candidates().find(|(_, el)| normalize_name(&el.display_name) == wanted))
            .map(|(id, _)| id)
    }
}
