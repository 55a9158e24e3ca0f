//! Indexed triple store (spec §4.5, component C5).
//!
//! Row-per-triple storage: every write appends a new version row, history
//! is never overwritten. Reads return the latest version per
//! `(subject, predicate)` unless the caller asks for full history.
//! Maintains subject and predicate secondary indexes so multi-subject and
//! predicate-scan reads are single bulk scans, not N+1 lookups.

use graphdb_core::error::Error;
use graphdb_core::ids::{EntityId, Predicate, TransactionId};
use graphdb_core::object::TypedObject;
use graphdb_core::triple::{latest_version, Triple};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Row-per-triple store with SPO-like (by subject) and POS-like (by
/// predicate) secondary indexes over an append-only row vector.
#[derive(Default)]
pub struct TripleStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Triple>,
    by_subject: FxHashMap<EntityId, Vec<usize>>,
    by_predicate: FxHashMap<Predicate, Vec<usize>>,
}

impl Inner {
    fn append(&mut self, t: Triple) {
        let idx = self.rows.len();
        self.by_subject.entry(t.subject.clone()).or_default().push(idx);
        self.by_predicate.entry(t.predicate.clone()).or_default().push(idx);
        self.rows.push(t);
    }
}

impl TripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new version row. Never overwrites history (spec §4.5).
    pub fn insert_triple(&self, triple: Triple) {
        self.inner.write().append(triple);
    }

    pub fn insert_triples(&self, triples: impl IntoIterator<Item = Triple>) {
        let mut inner = self.inner.write();
        for t in triples {
            inner.append(t);
        }
    }

    /// Append a new version row for `(subject, predicate)`. The source
    /// "update" path is normalized to append-only, versioned semantics
    /// (spec §9 open question): this never mutates an existing row.
    pub fn update_triple(
        &self,
        subject: EntityId,
        predicate: Predicate,
        object: TypedObject,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<(), Error> {
        let triple = Triple::new(subject, predicate, object, timestamp, tx_id)?;
        self.inner.write().append(triple);
        Ok(())
    }

    /// Tombstone `(subject, predicate)`: append a `NULL`-object row at
    /// `timestamp`.
    pub fn delete_triple(
        &self,
        subject: EntityId,
        predicate: Predicate,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<(), Error> {
        let triple = Triple::new(subject, predicate, TypedObject::Null, timestamp, tx_id)?;
        self.inner.write().append(triple);
        Ok(())
    }

    /// Tombstone every predicate currently live for `subject`: one
    /// tombstone row per current (non-tombstoned) predicate.
    pub fn delete_entity(
        &self,
        subject: &EntityId,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<usize, Error> {
        let current = self.get_triples(subject);
        let mut inner = self.inner.write();
        let mut count = 0usize;
        for t in current {
            if t.is_tombstone_value() {
                continue;
            }
            let tomb = Triple::new(
                subject.clone(),
                t.predicate.clone(),
                TypedObject::Null,
                timestamp,
                tx_id.clone(),
            )?;
            inner.append(tomb);
            count += 1;
        }
        Ok(count)
    }

    /// All rows (full history) for `subject`, in insertion order.
    pub fn history(&self, subject: &EntityId) -> Vec<Triple> {
        let inner = self.inner.read();
        inner
            .by_subject
            .get(subject)
            .map(|idxs| idxs.iter().map(|&i| inner.rows[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Latest, non-tombstoned version of every predicate for `subject`.
    pub fn get_triples(&self, subject: &EntityId) -> Vec<Triple> {
        let inner = self.inner.read();
        let Some(idxs) = inner.by_subject.get(subject) else {
            return Vec::new();
        };
        let mut by_pred: FxHashMap<&Predicate, Vec<&Triple>> = FxHashMap::default();
        for &i in idxs {
            let t = &inner.rows[i];
            by_pred.entry(&t.predicate).or_default().push(t);
        }
        by_pred
            .into_values()
            .filter_map(|versions| latest_version(versions).cloned())
            .filter(|t| !t.is_tombstone_value())
            .collect()
    }

    /// Latest version of a single `(subject, predicate)`, including a
    /// tombstone if that is the current version (caller decides what a
    /// tombstone means for its use case).
    pub fn get_latest_triple(&self, subject: &EntityId, predicate: &Predicate) -> Option<Triple> {
        let inner = self.inner.read();
        let idxs = inner.by_subject.get(subject)?;
        let versions: Vec<&Triple> = idxs
            .iter()
            .map(|&i| &inner.rows[i])
            .filter(|t| &t.predicate == predicate)
            .collect();
        latest_version(versions).cloned()
    }

    /// Bulk fetch latest triples for many subjects in one pass over the
    /// index — no N+1 (spec §4.5 explicit contract).
    pub fn get_triples_for_multiple_subjects(
        &self,
        ids: &[EntityId],
    ) -> FxHashMap<EntityId, Vec<Triple>> {
        let inner = self.inner.read();
        let mut out = FxHashMap::default();
        for id in ids {
            let triples = match inner.by_subject.get(id) {
                Some(idxs) => {
                    let mut by_pred: FxHashMap<&Predicate, Vec<&Triple>> = FxHashMap::default();
                    for &i in idxs {
                        let t = &inner.rows[i];
                        by_pred.entry(&t.predicate).or_default().push(t);
                    }
                    by_pred
                        .into_values()
                        .filter_map(|versions| latest_version(versions).cloned())
                        .filter(|t| !t.is_tombstone_value())
                        .collect()
                }
                None => Vec::new(),
            };
            out.insert(id.clone(), triples);
        }
        out
    }

    /// All latest, non-tombstoned rows carrying `predicate`, across every
    /// subject (a POS-like scan).
    pub fn get_triples_by_predicate(&self, predicate: &Predicate) -> Vec<Triple> {
        let inner = self.inner.read();
        let Some(idxs) = inner.by_predicate.get(predicate) else {
            return Vec::new();
        };
        let mut by_subject: FxHashMap<&EntityId, Vec<&Triple>> = FxHashMap::default();
        for &i in idxs {
            let t = &inner.rows[i];
            by_subject.entry(&t.subject).or_default().push(t);
        }
        by_subject
            .into_values()
            .filter_map(|versions| latest_version(versions).cloned())
            .filter(|t| !t.is_tombstone_value())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().rows.len()
    }
}
