//! Verdicts produced by content intelligence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What to do with a cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionAction {
    /// Content is outdated or irrelevant.
    Delete,
    /// Content should be refetched soon.
    Refresh,
    /// Content is still valid.
    Keep,
}

impl RetentionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RetentionAction::Delete => "delete",
            RetentionAction::Refresh => "refresh",
            RetentionAction::Keep => "keep",
        }
    }
}

impl fmt::Display for RetentionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a content-safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyVerdict {
    Safe,
    Unsafe,
    /// The classifier failed; curator policy decides.
    Unknown,
}

impl From<bool> for SafetyVerdict {
    fn from(safe: bool) -> Self {
        if safe {
            SafetyVerdict::Safe
        } else {
            SafetyVerdict::Unsafe
        }
    }
}
