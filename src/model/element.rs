//! Indexed element: the node of the relationship graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ElementId, Relationship, RelationshipType};

/// An element as the relationship graph sees it: searchable text plus the
/// outgoing edges it owns, grouped by relationship type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedElement {
    /// Display name; may differ from the id's name segment.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form custom fields whose text takes part in discovery.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    #[serde(default)]
    pub relationships: BTreeMap<RelationshipType, Vec<Relationship>>,
}

impl IndexedElement {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), ..Default::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Concatenated text searched by pattern discovery: name, description,
    /// keywords, tags and custom field values.
    pub fn corpus(&self, id: &ElementId) -> String {
        let mut parts: Vec<&str> = vec![id.name(), &self.display_name, &self.description];
        parts.extend(self.keywords.iter().map(String::as_str));
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.custom.values().map(String::as_str));
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    pub fn edge_count(&self) -> usize {
        self.relationships.values().map(Vec::len).sum()
    }

    /// Whether an edge of `rel_type` to `target` (by id string) exists.
    pub fn has_edge(&self, rel_type: RelationshipType, target: &str) -> bool {
        self.relationships
            .get(&rel_type)
            .is_some_and(|rels| rels.iter().any(|r| r.element == target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_joins_all_text_fields() {
        let id = ElementId::parse("skills:code-review").unwrap();
        let el = IndexedElement::new("Code Review")
            .with_description("Reviews pull requests")
            .with_keywords(["review"])
            .with_tags(["quality"])
            .with_custom("notes", "uses lint-runner");
        let corpus = el.corpus(&id);
        for needle in ["code-review", "Code Review", "pull requests", "review", "quality", "lint-runner"] {
            assert!(corpus.contains(needle), "missing {needle} in {corpus}");
        }
    }
}
