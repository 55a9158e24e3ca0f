//! CDC message types exchanged between a shard and the coordinator
//! (spec §6 "CDC shard→coordinator message types").

use graphdb_core::ids::Namespace;
use graphdb_core::triple::Triple;
use serde::{Deserialize, Serialize};

/// The operation that produced a CDC event. Carried alongside the triple
/// itself so consumers don't have to re-derive it from the tombstone bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripleEventKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleEvent {
    pub kind: TripleEventKind,
    pub triple: Triple,
}

/// Messages a shard sends to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CdcMessage {
    Register {
        shard_id: String,
        namespace: Namespace,
        last_sequence: u64,
    },
    Deregister {
        shard_id: String,
    },
    Cdc {
        shard_id: String,
        namespace: Namespace,
        events: Vec<TripleEvent>,
        sequence: u64,
    },
}

/// Messages the coordinator sends back to a shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorMessage {
    Registered,
    Ack { shard_id: String, sequence: u64, events_acked: usize },
    Error { message: String },
}

/// Outbound side of the shard<->coordinator channel. The actual transport
/// (WebSocket framing, the runtime's per-actor mailbox) is out of scope
/// (spec §1); this is the interface the coordinator drives.
pub trait ShardTransport: Send + Sync {
    fn send(&self, message: CoordinatorMessage);
}

/// An object store sink the coordinator flushes GraphCol blobs to. The
/// concrete backend is an external collaborator (spec §1); only this
/// interface is owned here.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), String>;
}

/// In-memory object store used by tests and examples.
#[derive(Default)]
pub struct InMemoryObjectStore {
    blobs: parking_lot::RwLock<rustc_hash::FxHashMap<String, Vec<u8>>>,
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), String> {
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl InMemoryObjectStore {
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }
}
