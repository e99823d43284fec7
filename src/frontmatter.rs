//! Split and parse the YAML header of an element file.
//!
//! ```text
//! ---
//! name: Debugging Helper
//! version: 1.2.0
//! privacy:
//!   local_only: true
//! ---
//! body...
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const FENCE: &str = "---";

/// Header fields the engine reads. Any other key lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementHeader {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub version: Option<String>,
    pub author: Option<String>,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub privacy: Privacy,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Privacy {
    pub local_only: bool,
}

impl ElementHeader {
    pub fn is_local_only(&self) -> bool {
        self.privacy.local_only
    }

    /// Text of the extra keys: scalars and lists of scalars. Nested maps
    /// are skipped.
    pub fn custom_text(&self) -> impl Iterator<Item = (&str, String)> {
        self.extra.iter().filter_map(|(key, value)| {
            let text = match value {
                serde_yaml::Value::Sequence(items) => {
                    items.iter().filter_map(scalar_text).collect::<Vec<_>>().join(" ")
                }
                other => scalar_text(other)?,
            };
            (!text.trim().is_empty()).then_some((key.as_str(), text))
        })
    }
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Versions are often written unquoted (`version: 1.0`), which YAML reads
/// as a number.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(serde_yaml::to_string(&other).unwrap_or_default().trim().to_string()),
    })
}

/// Split content into (header_yaml, body). `None` when there is no header.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after_open) = trimmed.strip_prefix(FENCE) else {
        return (None, content);
    };
    let Some(after_open) = after_open.strip_prefix('\n').or_else(|| after_open.strip_prefix("\r\n")) else {
        return (None, content);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, content)
}

/// Parse the header of `content`. Content without a header yields the default.
pub fn parse_header(content: &str) -> Result<ElementHeader> {
    match split(content) {
        (Some(yaml), _) if !yaml.trim().is_empty() => {
            serde_yaml::from_str(yaml).map_err(|e| Error::Frontmatter(e.to_string()))
        }
        _ => Ok(ElementHeader::default()),
    }
}
