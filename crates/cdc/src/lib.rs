//! CDC coordinator (spec §4.10, component C10): namespace-scoped event
//! buffer with sequence-ordered ingestion, time/size-triggered flush of
//! GraphCol blobs to an object store, and at-most-once acknowledgement.

pub mod coordinator;
pub mod events;
pub mod path;

pub use coordinator::{CdcCoordinator, CdcError, FlushReport, ShardRegistration, FLUSH_TIMEOUT_MS, MAX_BATCH_SIZE};
pub use events::{CdcMessage, CoordinatorMessage, InMemoryObjectStore, ObjectStore, ShardTransport, TripleEvent, TripleEventKind};
