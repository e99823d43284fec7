//! Breadth-first traversal over stored relationships.
//!
//! Edges below `min_strength` or outside `relationship_types` are pruned
//! before they are followed. Malformed targets are skipped.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashSet;

use super::RelationshipGraph;
use crate::model::*;

/// Traversal limits and filters.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub max_depth: usize,
    /// Only follow these types; `None` follows every type.
    pub relationship_types: Option<Vec<RelationshipType>>,
    pub min_strength: f64,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self { max_depth: 3, relationship_types: None, min_strength: 0.0 }
    }
}

impl TraversalOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.relationship_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = min_strength;
        self
    }

    fn follows(&self, rel_type: RelationshipType) -> bool {
        self.relationship_types.as_ref().is_none_or(|types| types.contains(&rel_type))
    }
}

impl RelationshipGraph {
    /// Outgoing edges of `id` that survive the option filters.
    fn neighbours(&self, id: &ElementId, opts: &TraversalOptions) -> Vec<(RelationshipType, f64, ElementId)> {
        let Some(element) = self.elements.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (rel_type, rels) in &element.relationships {
            if !opts.follows(*rel_type) {
                continue;
            }
            for rel in rels {
                let strength = rel.effective_strength();
                if strength < opts.min_strength {
                    continue;
                }
                if let ParsedRelationship::Valid { target, .. } = rel.parse() {
                    out.push((*rel_type, strength, target));
                }
            }
        }
        out
    }

    /// Shortest path (in hops) from `from` to `to`, at most `max_depth` hops.
    ///
    /// BFS guarantees the fewest hops, not the highest strength.
    pub fn find_path(&self, from: &ElementId, to: &ElementId, opts: &TraversalOptions) -> Option<RelationshipPath> {
        if from == to {
            return Some(RelationshipPath::single(from.clone()));
        }

        let mut visited: HashSet<ElementId> = HashSet::new();
        visited.insert(from.clone());
        let mut queue = VecDeque::from([RelationshipPath::single(from.clone())]);

        while let Some(path) = queue.pop_front() {
            if path.len() >= opts.max_depth {
                continue;
            }
            for (rel_type, strength, target) in self.neighbours(path.end(), opts) {
                if visited.contains(&target) {
                    continue;
                }
                let next = path.extended(rel_type, strength, target.clone());
                if &target == to {
                    return Some(next);
                }
                visited.insert(target);
                queue.push_back(next);
            }
        }
        None
    }

    /// Every element reachable from `root`, with the first path found to it.
    ///
    /// Elements are expanded while their depth is at most `max_depth`, so
    /// results reach up to `max_depth + 1` hops. The root is not included.
    pub fn get_connected(&self, root: &ElementId, opts: &TraversalOptions) -> BTreeMap<ElementId, RelationshipPath> {
        let mut found = BTreeMap::new();
        let mut visited: HashSet<ElementId> = HashSet::new();
        visited.insert(root.clone());
        let mut queue = VecDeque::from([RelationshipPath::single(root.clone())]);

        while let Some(path) = queue.pop_front() {
            if path.len() > opts.max_depth {
                continue;
            }
            for (rel_type, strength, target) in self.neighbours(path.end(), opts) {
                if !visited.insert(target.clone()) {
                    continue;
                }
                let next = path.extended(rel_type, strength, target.clone());
                found.insert(target, next.clone());
                queue.push_back(next);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ElementId {
        ElementId::parse(s).unwrap()
    }

    /// a -uses(0.8)-> b -requires(0.5)-> c -uses(0.9)-> d
    fn chain() -> RelationshipGraph {
        let mut g = RelationshipGraph::default();
        for n in ["a", "b", "c", "d"] {
            g.insert_element(id(&format!("skills:{n}")), IndexedElement::new(n));
        }
        let a = id("skills:a");
        let b = id("skills:b");
        let c = id("skills:c");
        let d = id("skills:d");
        g.add_relationship(&a, Relationship::new(&b, RelationshipType::Uses, 0.8)).unwrap();
        g.add_relationship(&b, Relationship::new(&c, RelationshipType::Requires, 0.5)).unwrap();
        g.add_relationship(&c, Relationship::new(&d, RelationshipType::Uses, 0.9)).unwrap();
        g
    }

    #[test]
    fn finds_path_with_multiplied_strength() {
        let g = chain();
        let path = g.find_path(&id("skills:a"), &id("skills:c"), &TraversalOptions::default()).unwrap();
        assert_eq!(path.len(), 2);
        assert!((path.strength() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn max_depth_bounds_path_length() {
        let g = chain();
        let opts = TraversalOptions::default().with_max_depth(1);
        assert!(g.find_path(&id("skills:a"), &id("skills:c"), &opts).is_none());
        assert!(g.find_path(&id("skills:a"), &id("skills:b"), &opts).is_some());
    }

    #[test]
    fn prunes_weak_and_filtered_edges() {
        let g = chain();
        let weak = TraversalOptions::default().with_min_strength(0.6);
        assert!(g.find_path(&id("skills:a"), &id("skills:c"), &weak).is_none());

        let uses_only = TraversalOptions::default().with_types([RelationshipType::Uses]);
        assert!(g.find_path(&id("skills:a"), &id("skills:c"), &uses_only).is_none());
    }

    #[test]
    fn prefers_fewest_hops() {
        let mut g = chain();
        let a = id("skills:a");
        g.add_relationship(&a, Relationship::new(&id("skills:d"), RelationshipType::SimilarTo, 0.1)).unwrap();
        let path = g.find_path(&a, &id("skills:d"), &TraversalOptions::default()).unwrap();
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn connected_reaches_one_past_max_depth() {
        let g = chain();
        let found = g.get_connected(&id("skills:a"), &TraversalOptions::default().with_max_depth(1));
        assert_eq!(found.len(), 2);
        assert!(found.contains_key(&id("skills:b")));
        assert_eq!(found[&id("skills:c")].len(), 2);
        assert!(!found.contains_key(&id("skills:a")));
    }

    #[test]
    fn connected_survives_cycles() {
        let mut g = chain();
        g.add_relationship(&id("skills:d"), Relationship::new(&id("skills:a"), RelationshipType::Uses, 1.0)).unwrap();
        let found = g.get_connected(&id("skills:a"), &TraversalOptions::default().with_max_depth(10));
        assert_eq!(found.len(), 3);
    }
}
