//! Error types for the blocklist engine.
//!
//! Configuration-time failures (`InvalidPattern`) are surfaced to the operator
//! and abort startup. Refresh-time failures (`SourceFetch`, `AllSourcesFailed`,
//! `RefreshInProgress`) stay inside the updater. Snapshot failures (`NotFound`,
//! `CorruptSnapshot`) fall back to an empty blocklist and an immediate refresh.
//! The query path has no error conditions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlocklistError {
    /// A regex rule failed to compile and was rejected.
    #[error("invalid rule pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// One source could not be fetched or read during a refresh cycle.
    #[error("failed to fetch blocklist source {source_id}: {reason}")]
    SourceFetch { source_id: String, reason: String },

    /// Every configured source failed; the previous blocklist stays active.
    #[error("all {attempted} blocklist sources failed")]
    AllSourcesFailed { attempted: usize },

    #[error("no blocklist snapshot at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("corrupt blocklist snapshot at {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A refresh was requested while another cycle was running.
    #[error("a blocklist refresh is already in progress")]
    RefreshInProgress,
}

impl BlocklistError {
    pub fn source_fetch(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceFetch {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the failure leaves the filter serving with older data rather
    /// than requiring operator action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceFetch { .. }
                | Self::AllSourcesFailed { .. }
                | Self::NotFound { .. }
                | Self::CorruptSnapshot { .. }
                | Self::RefreshInProgress
        )
    }
}

pub type Result<T, E = BlocklistError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let err = BlocklistError::AllSourcesFailed { attempted: 3 };
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "all 3 blocklist sources failed");

        let regex_err = regex::Regex::new("(").unwrap_err();
        let err = BlocklistError::InvalidPattern {
            pattern: "(".to_string(),
            source: regex_err,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().starts_with("invalid rule pattern \"(\""));
    }
}
