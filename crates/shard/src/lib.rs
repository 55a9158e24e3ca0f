//! Shard actor (spec §4.6, component C6): composes the chunk store (C4)
//! and indexed triple store (C5) behind single-writer request handlers —
//! insert/get/update/delete, lookup/traverse/filter, chunk admin, and
//! lifecycle/ops endpoints.

pub mod actor;
pub mod config;
pub mod error;

pub use actor::{CdcSink, Direction, OperationStatus, ShardActor};
pub use config::ShardConfig;
pub use error::{Result, ShardError};
