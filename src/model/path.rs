//! Path: a start element followed by typed, weighted hops.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{ElementId, RelationshipType};

/// One traversed edge and the element it leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub relationship: RelationshipType,
    pub strength: f64,
    pub target: ElementId,
}

/// A path in the relationship graph: start -[rel]-> element -[rel]-> ...
///
/// Strength is the product of hop strengths, so every extra hop can only
/// weaken the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPath {
    pub start: ElementId,
    pub hops: SmallVec<[Hop; 4]>,
}

impl RelationshipPath {
    pub fn single(start: ElementId) -> Self {
        Self { start, hops: SmallVec::new() }
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn end(&self) -> &ElementId {
        self.hops.last().map_or(&self.start, |h| &h.target)
    }

    /// Multiplicative strength; `1.0` for the empty path.
    pub fn strength(&self) -> f64 {
        self.hops.iter().map(|h| h.strength).product()
    }

    /// Every element on the path, start first.
    pub fn elements(&self) -> impl Iterator<Item = &ElementId> {
        std::iter::once(&self.start).chain(self.hops.iter().map(|h| &h.target))
    }

    pub fn relationship_types(&self) -> impl Iterator<Item = RelationshipType> + '_ {
        self.hops.iter().map(|h| h.relationship)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements().any(|e| e == id)
    }

    /// Extend the path by one hop, returning the new path.
    pub fn extended(&self, relationship: RelationshipType, strength: f64, target: ElementId) -> Self {
        let mut next = self.clone();
        next.hops.push(Hop { relationship, strength, target });
        next
    }
}
