//! The kinds of element a portfolio holds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Element kind. Each kind lives in its own portfolio directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Personas,
    Skills,
    Templates,
    Agents,
    Memories,
    Ensembles,
}

impl ElementType {
    pub const ALL: [ElementType; 6] = [
        ElementType::Personas,
        ElementType::Skills,
        ElementType::Templates,
        ElementType::Agents,
        ElementType::Memories,
        ElementType::Ensembles,
    ];

    /// Directory name under the portfolio root (local and remote).
    pub fn dir_name(self) -> &'static str {
        match self {
            ElementType::Personas => "personas",
            ElementType::Skills => "skills",
            ElementType::Templates => "templates",
            ElementType::Agents => "agents",
            ElementType::Memories => "memories",
            ElementType::Ensembles => "ensembles",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            ElementType::Personas => "persona",
            ElementType::Skills => "skill",
            ElementType::Templates => "template",
            ElementType::Agents => "agent",
            ElementType::Memories => "memory",
            ElementType::Ensembles => "ensemble",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ElementType {
    type Err = crate::Error;

    /// Accepts the plural directory form or the singular form, any case.
    fn from_str(s: &str) -> crate::Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        ElementType::ALL
            .into_iter()
            .find(|t| t.dir_name() == lower || t.singular() == lower)
            .ok_or_else(|| crate::Error::InvalidElementType(s.to_string()))
    }
}
