//! # Relationship Graph
//!
//! Owns the element index and every element's outgoing edges. Inverse
//! edges are materialized on the target element as independent records,
//! so deleting one side never leaves the other pointing at shared state.
//!
//! | Concern | Module |
//! |---------|--------|
//! | Storage, inverses, stats | this module |
//! | Pattern and verb discovery | `discovery` |
//! | Shortest path, neighbourhoods | `traversal` |

pub mod discovery;
pub mod traversal;

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::config::RelationshipConfig;
use crate::model::*;
use crate::{Error, Result};

pub use discovery::{DiscoveryPattern, DiscoveryReport, VerbCategory, default_patterns};
pub use traversal::TraversalOptions;

// ============================================================================
// RelationshipGraph
// ============================================================================

/// In-memory relationship graph over indexed elements.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    elements: BTreeMap<ElementId, IndexedElement>,
    config: RelationshipConfig,
}

impl RelationshipGraph {
    pub fn new(config: RelationshipConfig) -> Self {
        Self { elements: BTreeMap::new(), config }
    }

    pub fn config(&self) -> &RelationshipConfig {
        &self.config
    }

    /// Insert or replace an element. Returns the previous record, if any.
    pub fn insert_element(&mut self, id: ElementId, element: IndexedElement) -> Option<IndexedElement> {
        self.elements.insert(id, element)
    }

    /// Remove an element and every edge elsewhere that points at it.
    pub fn remove_element(&mut self, id: &ElementId) -> Option<IndexedElement> {
        let removed = self.elements.remove(id)?;
        let target = id.to_string();
        for element in self.elements.values_mut() {
            for rels in element.relationships.values_mut() {
                rels.retain(|r| r.element != target);
            }
            element.relationships.retain(|_, rels| !rels.is_empty());
        }
        Some(removed)
    }

    pub fn get(&self, id: &ElementId) -> Option<&IndexedElement> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.keys()
    }

    // ========================================================================
    // Edge mutation
    // ========================================================================

    /// Store a relationship on `source`.
    ///
    /// Edges are unique per (type, target); a duplicate only raises the
    /// stored strength. Returns true if a new edge was added.
    pub fn add_relationship(&mut self, source: &ElementId, rel: Relationship) -> Result<bool> {
        let rel_type = relationship_type_of(&rel)?;
        let element = self
            .elements
            .get_mut(source)
            .ok_or_else(|| Error::NotFound(format!("element {source}")))?;

        let rels = element.relationships.entry(rel_type).or_default();
        if let Some(existing) = rels.iter_mut().find(|r| r.element == rel.element) {
            if rel.effective_strength() > existing.effective_strength() {
                existing.strength = rel.strength;
            }
            return Ok(false);
        }
        rels.push(rel);
        Ok(true)
    }

    /// Materialize the mirror of `rel` (owned by `source`) on its target.
    ///
    /// Symmetric types, malformed targets and targets outside the index are
    /// skipped. Returns true if a mirror edge was added.
    pub fn add_inverse(&mut self, source: &ElementId, rel: &Relationship) -> bool {
        let Ok(rel_type) = relationship_type_of(rel) else {
            return false;
        };
        let inverse = rel_type.inverse();
        if inverse == rel_type {
            return false;
        }
        let ParsedRelationship::Valid { target, .. } = rel.parse() else {
            return false;
        };
        let Some(target_element) = self.elements.get_mut(&target) else {
            tracing::debug!(source = %source, target = %target, "inverse target not indexed");
            return false;
        };

        let source_str = source.to_string();
        if target_element.has_edge(inverse, &source_str) {
            return false;
        }

        let mirror = Relationship {
            element: source_str,
            relationship_type: Some(inverse.as_str().to_string()),
            strength: rel.strength,
            metadata: BTreeMap::new(),
        }
        .with_metadata(INVERSE_MARKER, true);

        target_element.relationships.entry(inverse).or_default().push(mirror);
        true
    }

    /// Add `source -[rel_type]-> target` plus its inverse mirror.
    pub fn link(
        &mut self,
        source: &ElementId,
        rel_type: RelationshipType,
        target: &ElementId,
        strength: f64,
    ) -> Result<bool> {
        let rel = Relationship::new(target, rel_type, strength);
        let added = self.add_relationship(source, rel.clone())?;
        self.add_inverse(source, &rel);
        Ok(added)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All edges owned by `id`, parsed.
    pub fn relationships_of(&self, id: &ElementId) -> Vec<(RelationshipType, ParsedRelationship)> {
        self.elements
            .get(id)
            .map(|el| {
                el.relationships
                    .iter()
                    .flat_map(|(t, rels)| rels.iter().map(move |r| (*t, r.parse())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every edge of one type across the graph, with its owner.
    pub fn relationships_by_type(&self, rel_type: RelationshipType) -> Vec<(ElementId, Relationship)> {
        self.elements
            .iter()
            .flat_map(|(id, el)| {
                el.relationships
                    .get(&rel_type)
                    .into_iter()
                    .flatten()
                    .map(move |r| (id.clone(), r.clone()))
            })
            .collect()
    }

    /// Every stored edge whose target fails to parse.
    pub fn invalid_relationships(&self) -> InvalidReport {
        let mut entries = Vec::new();
        for (id, el) in &self.elements {
            for (rel_type, rels) in &el.relationships {
                for rel in rels {
                    if let ParsedRelationship::Invalid { error, .. } = rel.parse() {
                        entries.push(InvalidEntry {
                            source: id.clone(),
                            relationship_type: *rel_type,
                            element: rel.element.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }
        }
        if !entries.is_empty() {
            tracing::warn!(count = entries.len(), "invalid relationships found");
        }
        InvalidReport { entries }
    }

    /// Counts per relationship type plus aggregates.
    pub fn stats(&self) -> GraphStats {
        let mut by_type: BTreeMap<RelationshipType, usize> =
            RelationshipType::ALL.into_iter().map(|t| (t, 0)).collect();
        let mut elements_with_relationships = 0;
        let mut invalid_relationships = 0;

        for el in self.elements.values() {
            if el.edge_count() > 0 {
                elements_with_relationships += 1;
            }
            for (rel_type, rels) in &el.relationships {
                *by_type.entry(*rel_type).or_default() += rels.len();
                invalid_relationships += rels.iter().filter(|r| !r.parse().is_valid()).count();
            }
        }

        GraphStats {
            total_relationships: by_type.values().sum(),
            by_type,
            total_elements: self.elements.len(),
            elements_with_relationships,
            invalid_relationships,
        }
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Discover and store relationships for every element, bounded by the
    /// configured wall-clock budget. Partial results are kept on timeout.
    pub fn discover_all(&mut self) -> DiscoveryReport {
        let deadline = Instant::now() + self.config.discovery_budget();
        self.discover_all_until(deadline)
    }

    pub fn discover_all_until(&mut self, deadline: Instant) -> DiscoveryReport {
        let started = Instant::now();
        let ids: Vec<ElementId> = self.elements.keys().cloned().collect();
        let mut report = DiscoveryReport::default();

        for id in ids {
            if Instant::now() >= deadline {
                tracing::warn!(
                    processed = report.processed,
                    remaining = self.elements.len() - report.processed,
                    "relationship discovery budget exhausted; keeping partial results"
                );
                report.timed_out = true;
                break;
            }

            match self.discover(&id) {
                Ok(found) => {
                    for rel in found {
                        match self.add_relationship(&id, rel.clone()) {
                            Ok(true) => {
                                report.added += 1;
                                if self.add_inverse(&id, &rel) {
                                    report.inverses_added += 1;
                                }
                            }
                            Ok(false) => {}
                            Err(e) => tracing::warn!(element = %id, error = %e, "failed to store relationship"),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(element = %id, error = %e, "relationship discovery failed");
                    report.failed.push(id.clone());
                }
            }
            report.processed += 1;
        }

        tracing::debug!(
            processed = report.processed,
            added = report.added,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "relationship discovery finished"
        );
        report
    }
}

fn relationship_type_of(rel: &Relationship) -> Result<RelationshipType> {
    rel.relationship_type
        .as_deref()
        .ok_or_else(|| Error::InvalidRelationshipType(format!("missing type on edge to {}", rel.element)))?
        .parse()
}

/// Keep, for each distinct target element, only the strongest relationship.
///
/// Output order follows the first appearance of each target.
pub fn deduplicate(relationships: impl IntoIterator<Item = Relationship>) -> Vec<Relationship> {
    let mut out: Vec<Relationship> = Vec::new();
    for rel in relationships {
        match out.iter_mut().find(|r| r.element == rel.element) {
            Some(existing) if rel.effective_strength() > existing.effective_strength() => *existing = rel,
            Some(_) => {}
            None => out.push(rel),
        }
    }
    out
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    /// Every declared type is present, zero when unused.
    pub by_type: BTreeMap<RelationshipType, usize>,
    pub total_relationships: usize,
    pub total_elements: usize,
    pub elements_with_relationships: usize,
    pub invalid_relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidEntry {
    pub source: ElementId,
    pub relationship_type: RelationshipType,
    pub element: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvalidReport {
    pub entries: Vec<InvalidEntry>,
}

impl InvalidReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} invalid relationships found", self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> ElementId {
        ElementId::parse(s).unwrap()
    }

    fn graph_with(ids: &[&str]) -> RelationshipGraph {
        let mut g = RelationshipGraph::default();
        for s in ids {
            let el = id(s);
            g.insert_element(el.clone(), IndexedElement::new(el.name()));
        }
        g
    }

    #[test]
    fn add_inverse_mirrors_with_same_strength() {
        let mut g = graph_with(&["skills:a", "skills:b"]);
        let rel = Relationship::new(&id("skills:b"), RelationshipType::Uses, 0.8);
        assert!(g.add_relationship(&id("skills:a"), rel.clone()).unwrap());
        assert!(g.add_inverse(&id("skills:a"), &rel));

        let b = g.get(&id("skills:b")).unwrap();
        let mirrored = &b.relationships[&RelationshipType::UsedBy][0];
        assert_eq!(mirrored.element, "skills:a");
        assert_eq!(mirrored.strength, Some(0.8));
        assert!(mirrored.is_inverse());

        // Second call is a no-op: dedup by target id.
        assert!(!g.add_inverse(&id("skills:a"), &rel));
        assert_eq!(g.get(&id("skills:b")).unwrap().edge_count(), 1);
    }

    #[test]
    fn every_asymmetric_type_gets_a_mirror() {
        for t in RelationshipType::ALL.into_iter().filter(|t| !t.is_symmetric()) {
            let mut g = graph_with(&["skills:a", "skills:b"]);
            g.link(&id("skills:a"), t, &id("skills:b"), 0.6).unwrap();
            let b = g.get(&id("skills:b")).unwrap();
            let back = &b.relationships[&t.inverse()][0];
            assert_eq!(back.element, "skills:a", "{t}");
            assert_eq!(back.strength, Some(0.6), "{t}");
        }
    }

    #[test]
    fn symmetric_types_are_not_mirrored() {
        let mut g = graph_with(&["skills:a", "skills:b"]);
        g.link(&id("skills:a"), RelationshipType::SimilarTo, &id("skills:b"), 0.7).unwrap();
        assert_eq!(g.get(&id("skills:b")).unwrap().edge_count(), 0);
    }

    #[test]
    fn duplicate_edge_keeps_strongest() {
        let mut g = graph_with(&["skills:a", "skills:b"]);
        let a = id("skills:a");
        g.add_relationship(&a, Relationship::new(&id("skills:b"), RelationshipType::Uses, 0.4)).unwrap();
        let added = g
            .add_relationship(&a, Relationship::new(&id("skills:b"), RelationshipType::Uses, 0.9))
            .unwrap();
        assert!(!added);
        let rels = &g.get(&a).unwrap().relationships[&RelationshipType::Uses];
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].strength, Some(0.9));
    }

    #[test]
    fn deduplicate_keeps_highest_strength_per_target() {
        let b = id("skills:b");
        let c = id("skills:c");
        let out = deduplicate(vec![
            Relationship::new(&b, RelationshipType::Uses, 0.6),
            Relationship::new(&c, RelationshipType::SimilarTo, 0.5),
            Relationship::new(&b, RelationshipType::Requires, 0.85),
            Relationship::new(&c, RelationshipType::Complements, 0.3),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].relationship_type.as_deref(), Some("requires"));
        assert_eq!(out[1].relationship_type.as_deref(), Some("similar_to"));
    }

    #[test]
    fn stats_zero_initialise_every_type() {
        let mut g = graph_with(&["skills:a", "skills:b", "skills:c"]);
        g.link(&id("skills:a"), RelationshipType::Uses, &id("skills:b"), 0.8).unwrap();
        let stats = g.stats();
        assert_eq!(stats.by_type.len(), RelationshipType::ALL.len());
        assert_eq!(stats.by_type[&RelationshipType::Uses], 1);
        assert_eq!(stats.by_type[&RelationshipType::UsedBy], 1);
        assert_eq!(stats.by_type[&RelationshipType::Contradicts], 0);
        assert_eq!(stats.total_relationships, 2);
        assert_eq!(stats.elements_with_relationships, 2);
        assert_eq!(stats.total_elements, 3);
    }

    #[test]
    fn invalid_relationships_are_reported_not_fatal() {
        let mut g = graph_with(&["skills:a"]);
        let a = id("skills:a");
        for bad in ["skills", ":x", "x:", "a:b:c"] {
            let rel = Relationship {
                element: bad.into(),
                relationship_type: Some("uses".into()),
                strength: None,
                metadata: BTreeMap::new(),
            };
            g.add_relationship(&a, rel).unwrap();
        }
        let report = g.invalid_relationships();
        assert_eq!(report.len(), 4);
        assert_eq!(report.summary(), "4 invalid relationships found");
        assert_eq!(g.stats().invalid_relationships, 4);
    }

    #[test]
    fn remove_element_drops_inbound_edges() {
        let mut g = graph_with(&["skills:a", "skills:b"]);
        g.link(&id("skills:a"), RelationshipType::Uses, &id("skills:b"), 0.8).unwrap();
        g.remove_element(&id("skills:b")).unwrap();
        assert_eq!(g.get(&id("skills:a")).unwrap().edge_count(), 0);
    }

    #[test]
    fn add_relationship_requires_known_source() {
        let mut g = graph_with(&["skills:a"]);
        let rel = Relationship::new(&id("skills:a"), RelationshipType::Uses, 0.8);
        assert!(matches!(g.add_relationship(&id("skills:zzz"), rel), Err(Error::NotFound(_))));
    }
}
