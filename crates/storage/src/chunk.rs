//! Chunk store — append-then-seal BLOB engine (spec §4.4, component C4).
//!
//! Each shard owns one `ChunkStore`: an in-memory ordered buffer of triples
//! plus a table of sealed, immutable chunk rows. `write` only ever touches
//! the buffer; `flush`/`force_flush` is the only durable write per batch.

use graphdb_core::error::Error;
use graphdb_core::ids::Namespace;
use graphdb_core::triple::Triple;
use graphdb_graphcol::codec::{decode, encode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Target number of triples per buffer flush / compaction run output.
pub const TARGET_BUFFER_SIZE: usize = 50_000;
/// Chunks smaller than this are eligible for compaction.
pub const MIN_CHUNK_SIZE_FOR_COMPACTION: usize = 10_000;
/// Minimum number of small chunks required before compaction runs.
pub const MIN_CHUNKS_FOR_COMPACTION: usize = 3;

/// A sealed, immutable chunk record (spec §3 "Chunk").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub namespace: Namespace,
    pub triple_count: usize,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    pub payload: Vec<u8>,
    pub size_bytes: usize,
    pub created_at: i64,
}

/// Caller-supplied clock, so tests can control `created_at` ordering
/// without this crate reaching for a global wall clock.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock implementation used in production.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

fn new_chunk_id(clock: &dyn Clock) -> String {
    // time-prefixed + random suffix, so chunk ids sort roughly by creation
    // time while staying globally unique.
    format!("{:016x}-{}", clock.now_millis() as u64, Uuid::new_v4().simple())
}

/// In-memory buffer + sealed-chunk table for one shard's namespace.
pub struct ChunkStore {
    namespace: Namespace,
    buffer: RwLock<Vec<Triple>>,
    chunks: RwLock<HashMap<String, Chunk>>,
    clock: Box<dyn Clock>,
}

impl ChunkStore {
    pub fn new(namespace: Namespace) -> Self {
        Self::with_clock(namespace, Box::new(SystemClock))
    }

    pub fn with_clock(namespace: Namespace, clock: Box<dyn Clock>) -> Self {
        ChunkStore {
            namespace,
            buffer: RwLock::new(Vec::new()),
            chunks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Append triples to the in-memory buffer. Synchronous, no durable
    /// write (spec §4.4).
    pub fn write(&self, triples: impl IntoIterator<Item = Triple>) {
        let mut buf = self.buffer.write();
        buf.extend(triples);
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.read().len()
    }

    /// Flush the buffer into one sealed chunk row if it is non-empty.
    /// Returns the new chunk's id, or `None` if the buffer was empty.
    pub fn flush(&self) -> Option<String> {
        self.flush_inner(false)
    }

    /// Force a flush even if below any size threshold a caller might be
    /// applying externally (the chunk store itself has no auto-threshold;
    /// callers, e.g. the shard actor, decide when to call flush).
    pub fn force_flush(&self) -> Option<String> {
        self.flush_inner(true)
    }

    fn flush_inner(&self, _force: bool) -> Option<String> {
        let mut buf = self.buffer.write();
        if buf.is_empty() {
            return None;
        }
        let triples = std::mem::take(&mut *buf);
        drop(buf);

        let (min_ts, max_ts) = triples.iter().fold((i64::MAX, i64::MIN), |(lo, hi), t| {
            (lo.min(t.timestamp), hi.max(t.timestamp))
        });
        let payload = encode(&triples, &self.namespace);
        let chunk = Chunk {
            id: new_chunk_id(self.clock.as_ref()),
            namespace: self.namespace.clone(),
            triple_count: triples.len(),
            min_timestamp: min_ts,
            max_timestamp: max_ts,
            size_bytes: payload.len(),
            payload,
            created_at: self.clock.now_millis(),
        };
        let id = chunk.id.clone();
        self.chunks.write().insert(id.clone(), chunk);
        Some(id)
    }

    /// Current version of each predicate for `subject`: scans the buffer
    /// first (newer), then sealed chunks in `createdAt DESC`, keeping the
    /// greatest-timestamp triple per predicate. Tombstones (NULL object at
    /// the greatest timestamp) are filtered from the result (spec §4.4).
    pub fn query(&self, subject: &str) -> Result<Vec<Triple>, Error> {
        let mut latest: HashMap<String, Triple> = HashMap::new();

        for t in self.buffer.read().iter().filter(|t| t.subject.as_str() == subject) {
            merge_latest(&mut latest, t.clone());
        }

        let mut chunks: Vec<Chunk> = self.chunks.read().values().cloned().collect();
        chunks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for chunk in &chunks {
            let decoded = decode(&chunk.payload)?;
            for t in decoded.triples.into_iter().filter(|t| t.subject.as_str() == subject) {
                merge_latest(&mut latest, t);
            }
        }

        Ok(latest
            .into_values()
            .filter(|t| !t.is_tombstone_value())
            .collect())
    }

    pub fn list_chunks(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.chunks.read().values().cloned().collect();
        chunks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        chunks
    }

    pub fn get_chunk(&self, id: &str) -> Option<Chunk> {
        self.chunks.read().get(id).cloned()
    }

    pub fn delete_chunk(&self, id: &str) -> bool {
        self.chunks.write().remove(id).is_some()
    }

    pub fn chunk_stats(&self) -> ChunkStats {
        let chunks = self.chunks.read();
        ChunkStats {
            chunk_count: chunks.len(),
            total_triples: chunks.values().map(|c| c.triple_count).sum(),
            total_size_bytes: chunks.values().map(|c| c.size_bytes).sum(),
            buffered_triples: self.buffer.read().len(),
        }
    }

    /// Compact small chunks into larger ones (spec §4.4).
    ///
    /// Selects chunks with `triple_count < MIN_CHUNK_SIZE_FOR_COMPACTION`;
    /// if at least `MIN_CHUNKS_FOR_COMPACTION` qualify, decodes all of
    /// them, sorts all triples by timestamp ascending, partitions into
    /// `TARGET_BUFFER_SIZE`-sized runs, re-encodes each run as a new chunk,
    /// and only then deletes the source chunks — so a crash between the
    /// two steps leaves a duplicate-tolerant state (both old and new
    /// chunks present), never data loss.
    pub fn compact(&self) -> Result<CompactionReport, Error> {
        let candidates: Vec<Chunk> = self
            .chunks
            .read()
            .values()
            .filter(|c| c.triple_count < MIN_CHUNK_SIZE_FOR_COMPACTION)
            .cloned()
            .collect();

        if candidates.len() < MIN_CHUNKS_FOR_COMPACTION {
            return Ok(CompactionReport {
                ran: false,
                chunks_compacted: 0,
                new_chunks: Vec::new(),
            });
        }

        let mut all_triples = Vec::new();
        for c in &candidates {
            all_triples.extend(decode(&c.payload)?.triples);
        }
        all_triples.sort_by_key(|t| t.timestamp);

        let mut new_ids = Vec::new();
        for run in all_triples.chunks(TARGET_BUFFER_SIZE) {
            let (min_ts, max_ts) = run.iter().fold((i64::MAX, i64::MIN), |(lo, hi), t| {
                (lo.min(t.timestamp), hi.max(t.timestamp))
            });
            let payload = encode(run, &self.namespace);
            let chunk = Chunk {
                id: new_chunk_id(self.clock.as_ref()),
                namespace: self.namespace.clone(),
                triple_count: run.len(),
                min_timestamp: min_ts,
                max_timestamp: max_ts,
                size_bytes: payload.len(),
                payload,
                created_at: self.clock.now_millis(),
            };
            new_ids.push(chunk.id.clone());
            self.chunks.write().insert(chunk.id.clone(), chunk);
        }

        // Source deletion strictly after all new rows are durable.
        let mut chunks = self.chunks.write();
        for c in &candidates {
            chunks.remove(&c.id);
        }
        drop(chunks);

        Ok(CompactionReport {
            ran: true,
            chunks_compacted: candidates.len(),
            new_chunks: new_ids,
        })
    }
}

fn merge_latest(latest: &mut HashMap<String, Triple>, t: Triple) {
    let key = t.predicate.as_str().to_string();
    match latest.get(&key) {
        Some(existing) if existing.timestamp >= t.timestamp => {}
        _ => {
            latest.insert(key, t);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunk_count: usize,
    pub total_triples: usize,
    pub total_size_bytes: usize,
    pub buffered_triples: usize,
}

#[derive(Debug, Clone)]
pub struct CompactionReport {
    pub ran: bool,
    pub chunks_compacted: usize,
    pub new_chunks: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_core::ids::{EntityId, Predicate, TransactionId};
    use graphdb_core::object::TypedObject;

    struct FakeClock(std::sync::atomic::AtomicI64);
    impl Clock for FakeClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn triple(subj: &str, pred: &str, val: i64, ts: i64) -> Triple {
        Triple::new(
            EntityId::new(subj).unwrap(),
            Predicate::new(pred).unwrap(),
            TypedObject::Int64(val),
            ts,
            TransactionId::generate(ts as u64, [0; 10]),
        )
        .unwrap()
    }

    fn store() -> ChunkStore {
        ChunkStore::with_clock(
            Namespace::new("https://e.com").unwrap(),
            Box::new(FakeClock(std::sync::atomic::AtomicI64::new(1))),
        )
    }

    #[test]
    fn write_then_flush_seals_one_chunk() {
        let store = store();
        store.write([triple("https://e.com/a", "age", 1, 1)]);
        assert_eq!(store.buffer_len(), 1);
        let id = store.flush().unwrap();
        assert_eq!(store.buffer_len(), 0);
        assert!(store.get_chunk(&id).is_some());
    }

    #[test]
    fn flush_of_empty_buffer_is_noop() {
        let store = store();
        assert!(store.flush().is_none());
    }

    #[test]
    fn query_prefers_buffer_over_chunk_for_same_predicate() {
        let store = store();
        store.write([triple("https://e.com/a", "age", 1, 1)]);
        store.force_flush();
        store.write([triple("https://e.com/a", "age", 2, 5)]);
        let result = store.query("https://e.com/a").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].object, TypedObject::Int64(2));
    }

    #[test]
    fn tombstone_hides_predicate() {
        let store = store();
        store.write([triple("https://e.com/a", "age", 1, 1)]);
        store.force_flush();
        let tomb = Triple::new(
            EntityId::new("https://e.com/a").unwrap(),
            Predicate::new("age").unwrap(),
            TypedObject::Null,
            2,
            TransactionId::generate(2, [0; 10]),
        )
        .unwrap();
        store.write([tomb]);
        let result = store.query("https://e.com/a").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn compaction_preserves_triple_count_and_latest_values() {
        let store = store();
        for i in 0..3 {
            store.write([triple("https://e.com/a", "age", i, i)]);
            store.force_flush();
        }
        let before: usize = store.list_chunks().iter().map(|c| c.triple_count).sum();
        let report = store.compact().unwrap();
        assert!(report.ran);
        let after: usize = store.list_chunks().iter().map(|c| c.triple_count).sum();
        assert_eq!(before, after);
        let result = store.query("https://e.com/a").unwrap();
        assert_eq!(result[0].object, TypedObject::Int64(2));
    }

    #[test]
    fn compaction_skipped_below_minimum_chunk_count() {
        let store = store();
        store.write([triple("https://e.com/a", "age", 1, 1)]);
        store.force_flush();
        let report = store.compact().unwrap();
        assert!(!report.ran);
    }
}
