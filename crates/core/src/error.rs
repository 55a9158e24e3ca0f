//! Error types for the graph database core.
//!
//! Every trust boundary (identifier construction, codec decode, geo
//! validation) surfaces one of the variants below. We use `thiserror` for
//! `Display`/`Error` impls, matching the rest of the workspace.

use thiserror::Error;

/// Result alias used throughout `graphdb-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of identifier/value that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    InvalidEntityId,
    InvalidPredicate,
    InvalidNamespace,
    InvalidTransactionId,
    InvalidObjectType,
    InvalidGeo,
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationKind::InvalidEntityId => "InvalidEntityId",
            ValidationKind::InvalidPredicate => "InvalidPredicate",
            ValidationKind::InvalidNamespace => "InvalidNamespace",
            ValidationKind::InvalidTransactionId => "InvalidTransactionId",
            ValidationKind::InvalidObjectType => "InvalidObjectType",
            ValidationKind::InvalidGeo => "InvalidGeo",
        };
        f.write_str(s)
    }
}

/// Truncate a diagnostic echo of untrusted input to 100 chars.
pub fn truncated_echo(input: &str) -> String {
    const MAX: usize = 100;
    if input.chars().count() <= MAX {
        input.to_string()
    } else {
        let mut s: String = input.chars().take(MAX).collect();
        s.push('\u{2026}');
        s
    }
}

/// Error type for the core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A branded identifier or typed value failed validation.
    #[error("{kind}: {echo}")]
    Validation {
        kind: ValidationKind,
        /// Truncated echo (<=100 chars) of the offending input.
        echo: String,
    },

    /// The GraphCol frame failed to decode (CRC mismatch, unknown version,
    /// or tag/payload disagreement).
    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    pub fn validation(kind: ValidationKind, offending: &str) -> Self {
        Error::Validation {
            kind,
            echo: truncated_echo(offending),
        }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Whether this is a validation error (rejected at the trust boundary,
    /// never recovered locally — see spec §7 taxonomy item 1).
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Codec(_))
    }
}
