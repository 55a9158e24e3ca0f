//! Opaque pagination cursor (spec §4.9, §6): base64-encoded JSON, never
//! documented to clients as parseable. Validation checks structural
//! integrity, plan-hash agreement, and a one-hour freshness window.

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

const MAX_CURSOR_AGE_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(rename = "lastId")]
    pub last_id: String,
    #[serde(rename = "queryHash")]
    pub query_hash: u32,
    pub ts: i64,
    pub offset: u64,
}

impl CursorState {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("CursorState always serializes");
        graphdb_core::base64::encode(&json)
    }

    pub fn decode(raw: &str) -> Result<Self, ExecError> {
        let bytes = graphdb_core::base64::decode(raw).ok_or(ExecError::CursorMalformed)?;
        serde_json::from_slice(&bytes).map_err(|_| ExecError::CursorMalformed)
    }

    /// Validate against the current plan's hash and the current time.
    /// `query_hash` mismatch and staleness are both fatal, distinct
    /// rejection reasons (spec §4.9 cursor validation rules 3-4).
    pub fn validate(&self, current_query_hash: u32, now_ms: i64) -> Result<(), ExecError> {
        if self.query_hash != current_query_hash {
            return Err(ExecError::CursorQueryMismatch);
        }
        if now_ms - self.ts > MAX_CURSOR_AGE_MS {
            return Err(ExecError::CursorExpired);
        }
        Ok(())
    }
}
