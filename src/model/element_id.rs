//! Element identifiers: `"type:name"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator between the type and name segments.
pub const SEPARATOR: char = ':';

/// Why a string is not a valid `"type:name"` identifier.
///
/// Every variant names the exact defect so malformed stored data can be
/// traced back to its source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementIdError {
    #[error("element id is empty")]
    Empty,

    #[error("missing ':' separator in \"{input}\" (expected \"type:name\")")]
    MissingSeparator { input: String },

    #[error("leading ':' separator in \"{input}\": type segment is empty")]
    LeadingSeparator { input: String },

    #[error("trailing ':' separator in \"{input}\": name segment is empty")]
    TrailingSeparator { input: String },

    #[error("multiple ':' separators in \"{input}\" at positions {positions:?}")]
    MultipleSeparators { input: String, positions: Vec<usize> },
}

/// Opaque element identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    element_type: String,
    name: String,
}

impl ElementId {
    /// Build an id from its segments, rejecting empty segments or embedded separators.
    pub fn new(
        element_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ElementIdError> {
        let element_type = element_type.into();
        let name = name.into();
        Self::parse(&format!("{element_type}{SEPARATOR}{name}"))
    }

    /// Parse `"type:name"`. Pure and total: any input yields `Ok` or a
    /// descriptive `ElementIdError`, never a panic.
    pub fn parse(input: &str) -> Result<Self, ElementIdError> {
        if input.is_empty() {
            return Err(ElementIdError::Empty);
        }

        let positions: Vec<usize> = input
            .char_indices()
            .filter(|(_, c)| *c == SEPARATOR)
            .map(|(i, _)| i)
            .collect();

        match positions.as_slice() {
            [] => Err(ElementIdError::MissingSeparator { input: input.to_string() }),
            [pos] => {
                let (element_type, rest) = input.split_at(*pos);
                let name = &rest[SEPARATOR.len_utf8()..];
                if element_type.is_empty() {
                    Err(ElementIdError::LeadingSeparator { input: input.to_string() })
                } else if name.is_empty() {
                    Err(ElementIdError::TrailingSeparator { input: input.to_string() })
                } else {
                    Ok(Self {
                        element_type: element_type.to_string(),
                        name: name.to_string(),
                    })
                }
            }
            _ => Err(ElementIdError::MultipleSeparators {
                input: input.to_string(),
                positions,
            }),
        }
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.element_type, SEPARATOR, self.name)
    }
}

impl FromStr for ElementId {
    type Err = ElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Lowercase, with runs of whitespace and underscores folded to `-`.
///
/// Used both for name resolution during discovery and for local file stems.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || c == '_' {
            pending_dash = true;
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.extend(c.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_type_and_name() {
        let id = ElementId::parse("skills:debugging-helper").unwrap();
        assert_eq!(id.element_type(), "skills");
        assert_eq!(id.name(), "debugging-helper");
        assert_eq!(id.to_string(), "skills:debugging-helper");
    }

    #[test]
    fn names_each_defect() {
        assert_eq!(ElementId::parse(""), Err(ElementIdError::Empty));
        assert!(matches!(
            ElementId::parse("skills"),
            Err(ElementIdError::MissingSeparator { .. })
        ));
        assert!(matches!(
            ElementId::parse(":helper"),
            Err(ElementIdError::LeadingSeparator { .. })
        ));
        assert!(matches!(
            ElementId::parse("skills:"),
            Err(ElementIdError::TrailingSeparator { .. })
        ));
        assert!(matches!(ElementId::parse(":"), Err(ElementIdError::LeadingSeparator { .. })));
        assert_eq!(
            ElementId::parse("a:b:c"),
            Err(ElementIdError::MultipleSeparators {
                input: "a:b:c".into(),
                positions: vec![1, 3],
            })
        );
    }

    #[test]
    fn error_messages_mention_positions() {
        let err = ElementId::parse("x::y").unwrap_err();
        assert!(err.to_string().contains("[1, 2]"), "{err}");
    }

    #[test]
    fn serde_uses_string_form() {
        let id = ElementId::new("personas", "writer").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"personas:writer\"");
        let back: ElementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ElementId>("\"nope\"").is_err());
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  Debugging Helper "), "debugging-helper");
        assert_eq!(normalize_name("code_review__bot"), "code-review-bot");
        assert_eq!(normalize_name("Already-Normal"), "already-normal");
    }

    proptest! {
        #[test]
        fn format_then_parse_roundtrips(t in "[a-z][a-z0-9_-]{0,12}", n in "[A-Za-z0-9][A-Za-z0-9 _.-]{0,20}") {
            let raw = format!("{t}:{n}");
            let id = ElementId::parse(&raw).unwrap();
            prop_assert_eq!(id.element_type(), t.as_str());
            prop_assert_eq!(id.name(), n.as_str());
        }

        #[test]
        fn parse_never_panics(s in ".*") {
            let _ = ElementId::parse(&s);
        }
    }
}
