//! Shard actor configuration (spec §4.6 `config` endpoint).

use crate::error::ShardError;
use serde::{Deserialize, Serialize};

const MIN_CONNECTION_TIMEOUT_MS: u64 = 1_000;
const MAX_CONNECTION_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    pub connection_timeout_ms: u64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        ShardConfig {
            connection_timeout_ms: 30_000,
        }
    }
}

impl ShardConfig {
    /// `connectionTimeoutMs` must fall in `[1_000, 300_000]` (spec §4.6).
    pub fn validate(&self) -> Result<(), ShardError> {
        if !(MIN_CONNECTION_TIMEOUT_MS..=MAX_CONNECTION_TIMEOUT_MS).contains(&self.connection_timeout_ms) {
            return Err(ShardError::InvalidConfig(format!(
                "connectionTimeoutMs must be in [{MIN_CONNECTION_TIMEOUT_MS}, {MAX_CONNECTION_TIMEOUT_MS}], got {}",
                self.connection_timeout_ms
            )));
        }
        Ok(())
    }
}
