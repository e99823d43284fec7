//! Results of sync operations.
//!
//! Not-found, policy refusals and pending confirmations are ordinary
//! outcomes, not errors: each one performed no write.

use std::fmt;

use serde::Serialize;

/// Why an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Refusal {
    SyncDisabled,
    BulkDownloadDisabled,
    BulkUploadDisabled,
    /// The element declares `privacy.local_only: true`.
    LocalOnly,
    SecretsDetected { patterns: Vec<String> },
    CriticalContent { patterns: Vec<String> },
    RepositoryMissing,
    VersionUnavailable { requested: String, available: Option<String> },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::SyncDisabled => f.write_str("sync is disabled"),
            Refusal::BulkDownloadDisabled => f.write_str("bulk download is disabled"),
            Refusal::BulkUploadDisabled => f.write_str("bulk upload is disabled"),
            Refusal::LocalOnly => f.write_str("element is marked local-only"),
            Refusal::SecretsDetected { patterns } => write!(f, "possible secrets detected: {}", patterns.join(", ")),
            Refusal::CriticalContent { patterns } => {
                write!(f, "content failed validation: {}", patterns.join(", "))
            }
            Refusal::RepositoryMissing => f.write_str("remote portfolio repository does not exist"),
            Refusal::VersionUnavailable { requested, available } => match available {
                Some(v) => write!(f, "version {requested} unavailable (remote has {v})"),
                None => write!(f, "version {requested} unavailable"),
            },
        }
    }
}

impl Refusal {
    /// Display text followed by what the caller can do about it.
    pub fn message_with(&self, hint: &str) -> String {
        if hint.is_empty() { self.to_string() } else { format!("{self}. {hint}") }
    }
}

/// Terminal state of a single-element operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The write happened. `location` is the local path or remote URL.
    Applied { message: String, location: String },
    UpToDate { message: String },
    /// Nothing was written; repeat with consent to apply.
    PendingConfirmation { message: String, preview: String },
    NotFound { message: String },
    Refused { refusal: Refusal, message: String },
}

impl SyncOutcome {
    pub(crate) fn refused(refusal: Refusal, hint: &str) -> Self {
        let message = refusal.message_with(hint);
        SyncOutcome::Refused { refusal, message }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncOutcome::Applied { message, .. }
            | SyncOutcome::UpToDate { message }
            | SyncOutcome::PendingConfirmation { message, .. }
            | SyncOutcome::NotFound { message }
            | SyncOutcome::Refused { message, .. } => message,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, SyncOutcome::PendingConfirmation { .. })
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            SyncOutcome::Refused { refusal, .. } => Some(refusal),
            _ => None,
        }
    }
}
