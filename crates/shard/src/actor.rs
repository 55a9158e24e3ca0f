//! Shard actor (spec §4.6, component C6): composes the chunk store (C4)
//! and indexed triple store (C5) behind single-writer request handlers.
//! Per spec §5, the actor serializes all requests touching its state —
//! callers are expected to invoke it from one logical caller at a time;
//! internal locking exists only to satisfy `Send + Sync`, not to allow
//! concurrent writers.

use crate::config::ShardConfig;
use crate::error::{Result, ShardError};
use graphdb_cdc::{CdcMessage, TripleEvent, TripleEventKind};
use graphdb_core::entity::{materialize, materialize_all, Entity};
use graphdb_core::filter::{compare, FilterOp};
use graphdb_core::ids::{EntityId, Namespace, Predicate, TransactionId};
use graphdb_core::object::TypedObject;
use graphdb_core::triple::Triple;
use graphdb_storage::{Chunk, ChunkStats, ChunkStore, CompactionReport, TripleStore};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Direction for `traverse` (spec §4.6/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Sink a shard emits CDC messages into. The actual transport (the
/// runtime's WebSocket framing) is out of scope (spec §1); this is the
/// boundary the shard actor drives.
pub trait CdcSink: Send + Sync {
    fn emit(&self, message: CdcMessage);
}

/// A queued background operation (spec §4.6 `queueOperation`/`operationStatus`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    Failed(String),
}

struct QueuedOperation {
    id: String,
    status: OperationStatus,
}

pub struct ShardActor {
    shard_id: String,
    namespace: Namespace,
    chunks: ChunkStore,
    index: TripleStore,
    config: RwLock<ShardConfig>,
    connections: AtomicUsize,
    pending: Mutex<VecDeque<QueuedOperation>>,
    next_op_id: AtomicU64,
    cdc_sequence: AtomicU64,
    cdc_sink: Option<Arc<dyn CdcSink>>,
}

impl ShardActor {
    pub fn new(shard_id: impl Into<String>, namespace: Namespace) -> Self {
        Self::with_config(shard_id, namespace, ShardConfig::default())
    }

    pub fn with_config(shard_id: impl Into<String>, namespace: Namespace, config: ShardConfig) -> Self {
        ShardActor {
            shard_id: shard_id.into(),
            namespace: namespace.clone(),
            chunks: ChunkStore::new(namespace),
            index: TripleStore::new(),
            config: RwLock::new(config),
            connections: AtomicUsize::new(0),
            pending: Mutex::new(VecDeque::new()),
            next_op_id: AtomicU64::new(1),
            cdc_sequence: AtomicU64::new(0),
            cdc_sink: None,
        }
    }

    pub fn with_cdc_sink(mut self, sink: Arc<dyn CdcSink>) -> Self {
        self.cdc_sink = Some(sink);
        self
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    // -- writes -----------------------------------------------------

    /// Insert one or more triples: append to the chunk buffer and the
    /// triple index, then emit an Insert CDC event per triple.
    pub fn insert(&self, triples: Vec<Triple>) -> Result<usize> {
        let count = triples.len();
        self.chunks.write(triples.iter().cloned());
        self.index.insert_triples(triples.iter().cloned());
        self.emit_cdc(triples.into_iter().map(|t| (TripleEventKind::Insert, t)).collect());
        Ok(count)
    }

    /// Append a new version row for `(subject, predicate)` (append-only,
    /// per spec §9's normalization of the source "update" path).
    pub fn update(
        &self,
        subject: EntityId,
        predicate: Predicate,
        object: TypedObject,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<()> {
        let triple = Triple::new(subject, predicate, object, timestamp, tx_id)?;
        self.chunks.write([triple.clone()]);
        self.index.insert_triple(triple.clone());
        self.emit_cdc(vec![(TripleEventKind::Update, triple)]);
        Ok(())
    }

    pub fn delete(
        &self,
        subject: EntityId,
        predicate: Predicate,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<()> {
        let triple = Triple::new(subject, predicate, TypedObject::Null, timestamp, tx_id)?;
        self.chunks.write([triple.clone()]);
        self.index.insert_triple(triple.clone());
        self.emit_cdc(vec![(TripleEventKind::Delete, triple)]);
        Ok(())
    }

    pub fn delete_entity(&self, subject: &EntityId, timestamp: i64, tx_id: TransactionId) -> Result<usize> {
        let current = self.index.get_triples(subject);
        let mut tombstones = Vec::with_capacity(current.len());
        for t in &current {
            let tomb = Triple::new(subject.clone(), t.predicate.clone(), TypedObject::Null, timestamp, tx_id.clone())?;
            tombstones.push(tomb);
        }
        self.chunks.write(tombstones.iter().cloned());
        self.index.insert_triples(tombstones.iter().cloned());
        let count = tombstones.len();
        self.emit_cdc(tombstones.into_iter().map(|t| (TripleEventKind::Delete, t)).collect());
        Ok(count)
    }

    fn emit_cdc(&self, events: Vec<(TripleEventKind, Triple)>) {
        let Some(sink) = &self.cdc_sink else { return };
        if events.is_empty() {
            return;
        }
        let sequence = self.cdc_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        sink.emit(CdcMessage::Cdc {
            shard_id: self.shard_id.clone(),
            namespace: self.namespace.clone(),
            events: events
                .into_iter()
                .map(|(kind, triple)| TripleEvent { kind, triple })
                .collect(),
            sequence,
        });
    }

    // -- reads --------------------------------------------------------

    /// Latest, non-tombstoned triples for `subject` (the index is
    /// authoritative and cheaper than decoding chunks; the chunk store's
    /// own `query` exists for chunk-admin reads).
    pub fn get(&self, subject: &EntityId) -> Vec<Triple> {
        self.index.get_triples(subject)
    }

    pub fn get_predicate(&self, subject: &EntityId, predicate: &Predicate) -> Option<Triple> {
        self.index
            .get_latest_triple(subject, predicate)
            .filter(|t| !t.is_tombstone_value())
    }

    /// Batch-fetch entities by id — single underlying query, preserving
    /// input order and omitting missing ids (spec §6 `GET /lookup`).
    pub fn lookup(&self, ids: &[EntityId]) -> Vec<Entity> {
        let by_subject = self.index.get_triples_for_multiple_subjects(ids);
        ids.iter()
            .filter_map(|id| {
                let triples = by_subject.get(id)?;
                if triples.is_empty() {
                    return None;
                }
                Some(materialize(id, triples))
            })
            .collect()
    }

    /// Entities reachable via REF/REF_ARRAY objects of `predicate` from
    /// `from`, in `direction` (spec §4.6 `traverse`).
    pub fn traverse(&self, from: &EntityId, predicate: &Predicate, direction: Direction) -> Vec<Entity> {
        let targets: Vec<EntityId> = match direction {
            Direction::Outgoing => match self.index.get_latest_triple(from, predicate) {
                Some(t) if !t.is_tombstone_value() => refs_of(&t.object),
                _ => Vec::new(),
            },
            Direction::Incoming => self
                .index
                .get_triples_by_predicate(predicate)
                .into_iter()
                .filter(|t| refs_of(&t.object).contains(from))
                .map(|t| t.subject)
                .collect(),
        };
        self.lookup(&targets)
    }

    /// Predicate scan + in-memory typed comparison (spec §4.6 `filter`).
    /// Tombstones are already excluded by `get_triples_by_predicate`.
    pub fn filter(&self, field: &Predicate, op: FilterOp, value: &TypedObject) -> Vec<Entity> {
        self.index
            .get_triples_by_predicate(field)
            .into_iter()
            .filter(|t| compare(op, &t.object, value))
            .map(|t| {
                let history = self.index.get_triples(&t.subject);
                materialize(&t.subject, &history)
            })
            .collect()
    }

    // -- chunk admin ----------------------------------------------------

    pub fn list_chunks(&self) -> Vec<Chunk> {
        self.chunks.list_chunks()
    }

    pub fn get_chunk(&self, id: &str) -> Result<Chunk> {
        self.chunks.get_chunk(id).ok_or_else(|| ShardError::ChunkNotFound(id.to_string()))
    }

    pub fn delete_chunk(&self, id: &str) -> bool {
        self.chunks.delete_chunk(id)
    }

    pub fn compact(&self) -> Result<CompactionReport> {
        self.chunks.compact().map_err(ShardError::from)
    }

    pub fn chunk_stats(&self) -> ChunkStats {
        self.chunks.chunk_stats()
    }

    pub fn flush(&self) -> Option<String> {
        self.chunks.flush()
    }

    // -- lifecycle / ops ------------------------------------------------

    pub fn schedule_maintenance(&self) -> Result<CompactionReport> {
        self.compact()
    }

    pub fn queue_operation(&self) -> String {
        let id = format!("op-{}", self.next_op_id.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().push_back(QueuedOperation {
            id: id.clone(),
            status: OperationStatus::Pending,
        });
        id
    }

    pub fn operation_status(&self, id: &str) -> Result<OperationStatus> {
        self.pending
            .lock()
            .iter()
            .find(|op| op.id == id)
            .map(|op| op.status.clone())
            .ok_or_else(|| ShardError::UnknownOperation(id.to_string()))
    }

    pub fn mark_operation_done(&self, id: &str, status: OperationStatus) {
        if let Some(op) = self.pending.lock().iter_mut().find(|op| op.id == id) {
            op.status = status;
        }
    }

    pub fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.connections.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> ShardConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: ShardConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    /// Executor transport endpoint: `POST /expand {entityIds, fields}`
    /// (spec §4.9). Materializes then projects.
    pub fn expand(&self, ids: &[EntityId], fields: &[String]) -> Vec<Entity> {
        let entities = self.lookup(ids);
        if fields.is_empty() {
            return entities;
        }
        entities
            .into_iter()
            .map(|e| graphdb_core::entity::project_fields(&e, fields))
            .collect()
    }

    /// All currently-materialized entities in this shard (used by admin
    /// tooling and tests; not part of the spec's endpoint table but
    /// derivable from `materialize_all` over every subject's history).
    pub fn all_entities(&self) -> Vec<Entity> {
        let all: Vec<Triple> = self.list_chunks().iter().flat_map(decode_chunk_triples).collect();
        materialize_all(&all)
    }
}

fn decode_chunk_triples(chunk: &Chunk) -> Vec<Triple> {
    graphdb_graphcol::decode(&chunk.payload).map(|f| f.triples).unwrap_or_default()
}

fn refs_of(object: &TypedObject) -> Vec<EntityId> {
    match object {
        TypedObject::Ref(id) => vec![id.clone()],
        TypedObject::RefArray(ids) => ids.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eid(s: &str) -> EntityId {
        EntityId::new(s).unwrap()
    }
    fn pred(s: &str) -> Predicate {
        Predicate::new(s).unwrap()
    }
    fn tx(n: u64) -> TransactionId {
        TransactionId::generate(n, [0; 10])
    }
    fn shard() -> ShardActor {
        ShardActor::new("shard-1", Namespace::new("https://e.com").unwrap())
    }

    #[test]
    fn entity_lookup_scenario() {
        let s = shard();
        s.insert(vec![
            Triple::new(eid("https://e.com/alice"), pred("name"), TypedObject::String("Alice".into()), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/alice"), pred("age"), TypedObject::Int64(30), 1, tx(2)).unwrap(),
        ])
        .unwrap();
        let entities = s.lookup(&[eid("https://e.com/alice")]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "Thing");
        assert_eq!(entities[0].fields.len(), 2);
    }

    #[test]
    fn traverse_outgoing_follows_ref() {
        let s = shard();
        s.insert(vec![
            Triple::new(eid("https://e.com/alice"), pred("follows"), TypedObject::Ref(eid("https://e.com/bob")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/bob"), pred("age"), TypedObject::Int64(25), 1, tx(2)).unwrap(),
        ])
        .unwrap();
        let out = s.traverse(&eid("https://e.com/alice"), &pred("follows"), Direction::Outgoing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, eid("https://e.com/bob"));
    }

    #[test]
    fn traverse_incoming_reverse() {
        let s = shard();
        s.insert(vec![
            Triple::new(eid("https://e.com/bob"), pred("liked"), TypedObject::Ref(eid("https://e.com/post1")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/charlie"), pred("liked"), TypedObject::Ref(eid("https://e.com/post1")), 1, tx(2)).unwrap(),
        ])
        .unwrap();
        let likers = s.traverse(&eid("https://e.com/post1"), &pred("liked"), Direction::Incoming);
        assert_eq!(likers.len(), 2);
    }

    #[test]
    fn filter_skips_tombstones_and_applies_numeric_comparator() {
        let s = shard();
        s.insert(vec![
            Triple::new(eid("https://e.com/bob"), pred("age"), TypedObject::Int64(25), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/charlie"), pred("age"), TypedObject::Int64(35), 1, tx(2)).unwrap(),
        ])
        .unwrap();
        let over_30 = s.filter(&pred("age"), FilterOp::Gt, &TypedObject::Int64(30));
        assert_eq!(over_30.len(), 1);
        assert_eq!(over_30[0].id, eid("https://e.com/charlie"));
    }

    #[test]
    fn update_then_delete_entity_tombstones_all_fields() {
        let s = shard();
        s.insert(vec![
            Triple::new(eid("https://e.com/a"), pred("age"), TypedObject::Int64(1), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/a"), pred("name"), TypedObject::String("x".into()), 1, tx(2)).unwrap(),
        ])
        .unwrap();
        let n = s.delete_entity(&eid("https://e.com/a"), 10, tx(3)).unwrap();
        assert_eq!(n, 2);
        assert!(s.get(&eid("https://e.com/a")).is_empty());
    }

    #[test]
    fn config_validation_rejects_out_of_range() {
        let s = shard();
        let bad = ShardConfig { connection_timeout_ms: 1 };
        assert!(s.set_config(bad).is_err());
    }

    #[test]
    fn queued_operation_lifecycle() {
        let s = shard();
        let id = s.queue_operation();
        assert_eq!(s.operation_status(&id).unwrap(), OperationStatus::Pending);
        s.mark_operation_done(&id, OperationStatus::Done);
        assert_eq!(s.operation_status(&id).unwrap(), OperationStatus::Done);
    }
}
