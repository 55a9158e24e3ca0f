//! Hybrid shard storage engine: the append-then-seal chunk store (C4) and
//! the indexed, versioned triple store (C5), spec §4.4/§4.5.

pub mod chunk;
pub mod triplestore;

pub use chunk::{Chunk, ChunkStats, ChunkStore, CompactionReport};
pub use triplestore::TripleStore;
