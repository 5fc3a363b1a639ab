//! # Error Types
//!
//! The failure taxonomy shared by every ledger operation. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Every variant carries structured context: the operation attempted,
//!   the entity involved, and why it was rejected.
//! - Outer layers branch on [`ErrorKind`], never on message text.
//! - No ledger error is produced after a mutation has been committed.
//!   A failed escrow transfer is reported only after its rollback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The caller is not permitted to perform the operation.
    #[error("{operation}: caller {caller} is not authorized: {reason}")]
    Unauthorized {
        /// Operation name.
        operation: &'static str,
        /// The rejected caller address.
        caller: String,
        /// Why the caller was rejected.
        reason: String,
    },

    /// A referenced project, bid or dispute does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind (`project`, `bid`, `dispute`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Malformed or duplicate input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not allowed in the entity's current state.
    #[error("{operation} rejected for {subject}: {reason}")]
    InvalidState {
        /// Operation name.
        operation: &'static str,
        /// The entity whose state blocked the operation.
        subject: String,
        /// Which state condition failed.
        reason: String,
    },

    /// The external value transfer failed. The ledger has been rolled back.
    #[error("transfer of {amount} to {recipient} failed: {reason}")]
    TransferFailed {
        /// Intended recipient.
        recipient: String,
        /// Amount in smallest units.
        amount: String,
        /// Collaborator-supplied failure reason.
        reason: String,
    },

    /// A notification could not be canonicalized for digesting.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl LedgerError {
    /// The discriminant outer layers map on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
            Self::Canonicalization(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Failure categories, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required role.
    Unauthorized,
    /// Referenced entity is absent.
    NotFound,
    /// Malformed or duplicate input.
    Validation,
    /// Operation blocked by current state.
    InvalidState,
    /// External transfer failed and was rolled back.
    TransferFailed,
    /// A bug or an unexpected serialization failure.
    Internal,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 6] = [
        Self::Unauthorized,
        Self::NotFound,
        Self::Validation,
        Self::InvalidState,
        Self::TransferFailed,
        Self::Internal,
    ];

    /// Upper-case machine code used in HTTP error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::TransferFailed => "TRANSFER_FAILED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    /// Accepts both the upper-case code and the snake_case serde name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| {
                k.as_str().eq_ignore_ascii_case(s)
                    || serde_json::to_value(k)
                        .ok()
                        .and_then(|v| v.as_str().map(|name| name == s))
                        .unwrap_or(false)
            })
            .ok_or_else(|| format!("unknown error kind: {s:?}"))
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Event-log chain verification failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventChainError {
    /// Sequence numbers are not contiguous from 1.
    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap {
        /// The sequence number that should have appeared.
        expected: u64,
        /// The sequence number actually present.
        found: u64,
    },

    /// A record's event digest does not match its payload.
    #[error("event digest mismatch at sequence {sequence}")]
    PayloadMismatch {
        /// Offending record.
        sequence: u64,
    },

    /// A record's chain digest does not link to its predecessor.
    #[error("chain digest mismatch at sequence {sequence}")]
    ChainMismatch {
        /// Offending record.
        sequence: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            LedgerError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::not_found("project", 4).kind(),
            ErrorKind::NotFound
        );
        let err = LedgerError::InvalidState {
            operation: "select_bid",
            subject: "project:1".into(),
            reason: "dispute open".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err: LedgerError = CanonicalizationError::FloatRejected(1.5).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display_includes_context() {
        let err = LedgerError::Unauthorized {
            operation: "release_milestone_payment",
            caller: "0xmallory".into(),
            reason: "only the project owner may release payments".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("release_milestone_payment"));
        assert!(msg.contains("0xmallory"));
        assert_eq!(
            LedgerError::not_found("dispute", "dispute:9").to_string(),
            "dispute dispute:9 not found"
        );
    }

    #[test]
    fn test_kind_codes_are_distinct() {
        let codes: std::collections::HashSet<_> =
            ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_kind_from_str_accepts_both_spellings() {
        assert_eq!("invalid_state".parse::<ErrorKind>(), Ok(ErrorKind::InvalidState));
        assert_eq!("NOT_FOUND".parse::<ErrorKind>(), Ok(ErrorKind::NotFound));
        assert_eq!("validation".parse::<ErrorKind>(), Ok(ErrorKind::Validation));
        assert!("teapot".parse::<ErrorKind>().is_err());
    }
}
