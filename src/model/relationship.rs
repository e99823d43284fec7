//! Relationship (edge) between two elements.
//!
//! The persisted form is [`Relationship`]: a target id string plus an
//! optional type, strength and metadata. Parsing it yields a
//! [`ParsedRelationship`], which is either `Valid` with a typed target or
//! `Invalid` with the exact reason the stored target string is malformed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ElementId, ElementIdError};

/// Strength assumed for edges persisted without one.
pub const DEFAULT_STRENGTH: f64 = 0.5;

/// Metadata key marking an edge materialized as the mirror of another.
pub const INVERSE_MARKER: &str = "inverse";

// ============================================================================
// RelationshipType
// ============================================================================

/// Named relation between elements. Every type declares its inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Uses,
    UsedBy,
    Extends,
    ExtendedBy,
    Requires,
    RequiredBy,
    DependsOn,
    DependencyOf,
    Contains,
    ContainedBy,
    HelpsDebug,
    DebuggedBy,
    Supports,
    SupportedBy,
    PrerequisiteFor,
    HasPrerequisite,
    SimilarTo,
    Contradicts,
    Complements,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 19] = [
        RelationshipType::Uses,
        RelationshipType::UsedBy,
        RelationshipType::Extends,
        RelationshipType::ExtendedBy,
        RelationshipType::Requires,
        RelationshipType::RequiredBy,
        RelationshipType::DependsOn,
        RelationshipType::DependencyOf,
        RelationshipType::Contains,
        RelationshipType::ContainedBy,
        RelationshipType::HelpsDebug,
        RelationshipType::DebuggedBy,
        RelationshipType::Supports,
        RelationshipType::SupportedBy,
        RelationshipType::PrerequisiteFor,
        RelationshipType::HasPrerequisite,
        RelationshipType::SimilarTo,
        RelationshipType::Contradicts,
        RelationshipType::Complements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::Uses => "uses",
            RelationshipType::UsedBy => "used_by",
            RelationshipType::Extends => "extends",
            RelationshipType::ExtendedBy => "extended_by",
            RelationshipType::Requires => "requires",
            RelationshipType::RequiredBy => "required_by",
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::DependencyOf => "dependency_of",
            RelationshipType::Contains => "contains",
            RelationshipType::ContainedBy => "contained_by",
            RelationshipType::HelpsDebug => "helps_debug",
            RelationshipType::DebuggedBy => "debugged_by",
            RelationshipType::Supports => "supports",
            RelationshipType::SupportedBy => "supported_by",
            RelationshipType::PrerequisiteFor => "prerequisite_for",
            RelationshipType::HasPrerequisite => "has_prerequisite",
            RelationshipType::SimilarTo => "similar_to",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Complements => "complements",
        }
    }

    /// The statically declared inverse. Symmetric relations return themselves.
    pub fn inverse(self) -> RelationshipType {
        use RelationshipType::*;
        match self {
            Uses => UsedBy,
            UsedBy => Uses,
            Extends => ExtendedBy,
            ExtendedBy => Extends,
            Requires => RequiredBy,
            RequiredBy => Requires,
            DependsOn => DependencyOf,
            DependencyOf => DependsOn,
            Contains => ContainedBy,
            ContainedBy => Contains,
            HelpsDebug => DebuggedBy,
            DebuggedBy => HelpsDebug,
            Supports => SupportedBy,
            SupportedBy => Supports,
            PrerequisiteFor => HasPrerequisite,
            HasPrerequisite => PrerequisiteFor,
            SimilarTo => SimilarTo,
            Contradicts => Contradicts,
            Complements => Complements,
        }
    }

    pub fn is_symmetric(self) -> bool {
        self.inverse() == self
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidRelationshipType(s.to_string()))
    }
}

// ============================================================================
// Relationship (persisted form)
// ============================================================================

/// A relationship as it is stored on the owning element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Target element as `"type:name"`. May be malformed in stored data.
    pub element: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Relationship {
    pub fn new(target: &ElementId, rel_type: RelationshipType, strength: f64) -> Self {
        Self {
            element: target.to_string(),
            relationship_type: Some(rel_type.as_str().to_string()),
            strength: Some(strength.clamp(0.0, 1.0)),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stored strength, or [`DEFAULT_STRENGTH`] when absent.
    pub fn effective_strength(&self) -> f64 {
        self.strength.unwrap_or(DEFAULT_STRENGTH)
    }

    /// Whether this edge was materialized as an inverse mirror.
    pub fn is_inverse(&self) -> bool {
        self.metadata
            .get(INVERSE_MARKER)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Parse the target id. Never fails: malformed targets become `Invalid`.
    pub fn parse(&self) -> ParsedRelationship {
        match ElementId::parse(&self.element) {
            Ok(target) => ParsedRelationship::Valid { base: self.clone(), target },
            Err(error) => ParsedRelationship::Invalid { base: self.clone(), error },
        }
    }
}

// ============================================================================
// ParsedRelationship (derived, never persisted)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRelationship {
    Valid { base: Relationship, target: ElementId },
    Invalid { base: Relationship, error: ElementIdError },
}

impl ParsedRelationship {
    pub fn base(&self) -> &Relationship {
        match self {
            ParsedRelationship::Valid { base, .. } | ParsedRelationship::Invalid { base, .. } => base,
        }
    }

    pub fn target(&self) -> Option<&ElementId> {
        match self {
            ParsedRelationship::Valid { target, .. } => Some(target),
            ParsedRelationship::Invalid { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ParsedRelationship::Valid { .. })
    }

    /// Human-readable parse error for invalid relationships.
    pub fn parse_error(&self) -> Option<String> {
        match self {
            ParsedRelationship::Valid { .. } => None,
            ParsedRelationship::Invalid { error, .. } => Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn inverse_is_an_involution() {
        for t in RelationshipType::ALL {
            assert_eq!(t.inverse().inverse(), t, "{t}");
        }
        assert!(RelationshipType::SimilarTo.is_symmetric());
        assert!(RelationshipType::Contradicts.is_symmetric());
        assert!(RelationshipType::Complements.is_symmetric());
        assert_eq!(RelationshipType::Uses.inverse(), RelationshipType::UsedBy);
    }

    #[test]
    fn type_names_roundtrip() {
        for t in RelationshipType::ALL {
            assert_eq!(t.as_str().parse::<RelationshipType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn parse_valid_and_invalid() {
        let id = ElementId::parse("skills:helper").unwrap();
        let rel = Relationship::new(&id, RelationshipType::Uses, 0.8);
        let parsed = rel.parse();
        assert!(parsed.is_valid());
        assert_eq!(parsed.target(), Some(&id));

        let bad = Relationship { element: "skills".into(), ..rel.clone() };
        let parsed = bad.parse();
        assert!(!parsed.is_valid());
        assert!(parsed.parse_error().unwrap().contains("missing ':'"));
    }

    #[test]
    fn persisted_form_uses_type_key() {
        let id = ElementId::parse("skills:helper").unwrap();
        let rel = Relationship::new(&id, RelationshipType::Uses, 1.5).with_metadata(INVERSE_MARKER, true);
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "uses");
        assert_eq!(json["strength"], 1.0);
        assert!(rel.is_inverse());
    }

    proptest! {
        #[test]
        fn parse_is_total(s in ".*") {
            let rel = Relationship { element: s, relationship_type: None, strength: None, metadata: BTreeMap::new() };
            match rel.parse() {
                ParsedRelationship::Valid { target, .. } => prop_assert_eq!(target.to_string(), rel.element),
                ParsedRelationship::Invalid { error, .. } => prop_assert!(!error.to_string().is_empty()),
            }
        }
    }
}
