//! Content validation boundary and secret scanning.
//!
//! Sanitization and injection detection are external: they plug in through
//! [`ContentValidator`]. Only the verdict matters here: a `Critical`
//! severity aborts any write. Secret scanning is built in and runs before
//! uploads when `sync.privacy.scan_for_secrets` is set.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::ElementType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Verdict of a validator: the (possibly sanitized) content to use, plus
/// what was detected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub content: String,
    pub severity: Severity,
    pub detected_patterns: Vec<String>,
}

impl ValidationReport {
    pub fn clean(content: impl Into<String>) -> Self {
        Self { content: content.into(), severity: Severity::None, detected_patterns: Vec::new() }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Validate-and-sanitize black box.
pub trait ContentValidator: Send + Sync {
    fn validate(&self, content: &str, element_type: ElementType) -> ValidationReport;
}

/// Accepts everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughValidator;

impl ContentValidator for PassthroughValidator {
    fn validate(&self, content: &str, _element_type: ElementType) -> ValidationReport {
        ValidationReport::clean(content)
    }
}

// ============================================================================
// Secret scanning
// ============================================================================

struct SecretPattern {
    name: &'static str,
    regex: Regex,
}

static SECRET_PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    let table: [(&'static str, &str); 8] = [
        ("api_key", r#"(?i)\bapi[_-]?key\s*[:=]\s*['"]?[A-Za-z0-9_\-]{16,}"#),
        ("aws_access_key", r"\bAKIA[0-9A-Z]{16}\b"),
        ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        ("openai_key", r"\bsk-[A-Za-z0-9_\-]{20,}"),
        ("private_key", r"-----BEGIN (?:[A-Z]+ )?PRIVATE KEY-----"),
        ("bearer_token", r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]{20,}=*"),
        ("password", r#"(?i)\b(?:password|passwd|pwd)\s*[:=]\s*['"]?[^\s'"]{6,}"#),
        ("secret_or_token", r#"(?i)\b(?:secret|token|access[_-]?key)\s*[:=]\s*['"]?[A-Za-z0-9_\-/+]{12,}"#),
    ];
    table
        .into_iter()
        .map(|(name, pattern)| SecretPattern {
            name,
            regex: Regex::new(pattern).expect("static secret pattern"),
        })
        .collect()
});

/// Fixed-pattern scanner for credentials that must never leave the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretScanner;

impl SecretScanner {
    /// Names of every pattern that matched; empty when clean.
    pub fn scan(&self, content: &str) -> Vec<&'static str> {
        SECRET_PATTERNS
            .iter()
            .filter(|p| p.regex.is_match(content))
            .map(|p| p.name)
            .collect()
    }
}
