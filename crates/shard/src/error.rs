//! Shard-level error taxonomy (spec §7): validation errors from the core
//! crate plus shard-local not-found/config/operation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error(transparent)]
    Core(#[from] graphdb_core::Error),

    #[error("invalid shard config: {0}")]
    InvalidConfig(String),

    #[error("no triple for ({subject}, {predicate})")]
    NotFound { subject: String, predicate: String },

    #[error("chunk {0} not found")]
    ChunkNotFound(String),

    #[error("unknown queued operation {0}")]
    UnknownOperation(String),
}

pub type Result<T> = std::result::Result<T, ShardError>;
