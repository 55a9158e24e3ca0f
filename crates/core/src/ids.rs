//! Branded identifiers, validated once at construction (spec §3/§4.1).
//!
//! Each constructor is the only place an untrusted string becomes a typed,
//! opaque identifier; downstream code can assume the invariants hold.

use crate::error::{Error, ValidationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_ENTITY_ID_LEN: usize = 2048;

fn has_control_or_zero_width(s: &str) -> bool {
    s.chars().any(|c| {
        c == '\0'
            || c.is_control()
            || matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{2060}'
            )
    })
}

fn has_http_scheme(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// `EntityId`: a URL with scheme `http`/`https`, length <= 2048, free of
/// control characters, null bytes, and zero-width characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: &str) -> Result<Self, Error> {
        if raw.len() > MAX_ENTITY_ID_LEN {
            return Err(Error::validation(ValidationKind::InvalidEntityId, raw));
        }
        if !has_http_scheme(raw) {
            return Err(Error::validation(ValidationKind::InvalidEntityId, raw));
        }
        if has_control_or_zero_width(raw) {
            return Err(Error::validation(ValidationKind::InvalidEntityId, raw));
        }
        Ok(EntityId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `Predicate`: identifier-like string matching `[$A-Za-z_][A-Za-z0-9_$]*`;
/// must not contain `:` or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Predicate(String);

fn is_predicate_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic()
}

fn is_predicate_continue(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphanumeric()
}

impl Predicate {
    pub fn new(raw: &str) -> Result<Self, Error> {
        let mut chars = raw.chars();
        let ok = match chars.next() {
            Some(first) if is_predicate_start(first) => chars.all(is_predicate_continue),
            _ => false,
        };
        if !ok || raw.contains(':') || raw.chars().any(char::is_whitespace) {
            return Err(Error::validation(ValidationKind::InvalidPredicate, raw));
        }
        Ok(Predicate(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Predicate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Well-known `$type` predicate name.
pub const TYPE_PREDICATE: &str = "$type";
/// Default entity `$type` when none is present.
pub const DEFAULT_ENTITY_TYPE: &str = "Thing";

/// `Namespace`: a URL (`http`/`https`) used to partition entities to shards
/// via a stable hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(raw: &str) -> Result<Self, Error> {
        if !has_http_scheme(raw) {
            return Err(Error::validation(ValidationKind::InvalidNamespace, raw));
        }
        if has_control_or_zero_width(raw) {
            return Err(Error::validation(ValidationKind::InvalidNamespace, raw));
        }
        Ok(Namespace(raw.to_string()))
    }

    /// Short-form namespaces (e.g. `"user"`) are promoted to a canonical
    /// placeholder URL before hashing, so routing stays consistent between
    /// the short form and an equivalent fully-qualified URL (spec §4.8).
    pub fn canonicalize(raw: &str) -> Result<Self, Error> {
        if has_http_scheme(raw) {
            return Self::new(raw);
        }
        if raw.is_empty() || has_control_or_zero_width(raw) || raw.contains("://") {
            return Err(Error::validation(ValidationKind::InvalidNamespace, raw));
        }
        let promoted = format!("https://ns.graphdb.local/{raw}");
        Self::new(&promoted)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `TransactionId`: 26-character Crockford Base32 (ULID form),
/// lexicographically sortable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

const ULID_ALPHABET: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

impl TransactionId {
    pub fn new(raw: &str) -> Result<Self, Error> {
        if raw.len() != 26 {
            return Err(Error::validation(ValidationKind::InvalidTransactionId, raw));
        }
        if !raw.chars().all(|c| ULID_ALPHABET.contains(c.to_ascii_uppercase())) {
            return Err(Error::validation(ValidationKind::InvalidTransactionId, raw));
        }
        Ok(TransactionId(raw.to_uppercase()))
    }

    /// Generate a fresh ULID-form transaction id from a millisecond
    /// timestamp and a caller-supplied random payload (80 bits). Kept
    /// dependency-free: callers own the randomness source.
    pub fn generate(timestamp_ms: u64, random: [u8; 10]) -> Self {
        let mut bits: u128 = (timestamp_ms as u128 & 0xFFFF_FFFF_FFFF) << 80;
        for (i, byte) in random.iter().enumerate() {
            bits |= (*byte as u128) << (8 * (9 - i));
        }
        let mut out = [0u8; 26];
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = 5 * (25 - i);
            let idx = ((bits >> shift) & 0x1f) as usize;
            *slot = ULID_ALPHABET.as_bytes()[idx];
        }
        TransactionId(String::from_utf8(out.to_vec()).expect("ascii"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
