//! `Triple`: `(subject, predicate, object, timestamp, txId)` — the only
//! stored record (spec §3).

use crate::error::Error;
use crate::ids::{EntityId, Predicate, TransactionId};
use crate::object::TypedObject;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: EntityId,
    pub predicate: Predicate,
    pub object: TypedObject,
    /// 64-bit wide timestamp (epoch millis by convention; monotonic within
    /// a single shard actor per spec invariant 4).
    pub timestamp: i64,
    pub tx_id: TransactionId,
}

impl Triple {
    pub fn new(
        subject: EntityId,
        predicate: Predicate,
        object: TypedObject,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Result<Self, Error> {
        // Fields are already branded/validated at their own construction
        // sites (invariant 1); this constructor exists so every triple in
        // the system goes through one place.
        Ok(Triple {
            subject,
            predicate,
            object,
            timestamp,
            tx_id,
        })
    }

    /// A tombstone is a `NULL` object; whether it is the *current* tombstone
    /// for `(subject, predicate)` depends on it being the latest-timestamp
    /// version, which the store (not this type) determines.
    pub fn is_tombstone_value(&self) -> bool {
        self.object.is_null()
    }
}

/// Given a set of triples for the same `(subject, predicate)`, pick the
/// current version: the one with the greatest timestamp. Ties are broken
/// by `tx_id` (lexicographically greater ULID = later), since timestamps
/// are only monotone, not guaranteed strictly increasing across writers
/// (spec §3 invariant 4 recommends strict but does not require it).
pub fn latest_version<'a, I>(triples: I) -> Option<&'a Triple>
where
    I: IntoIterator<Item = &'a Triple>,
{
    triples.into_iter().max_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.tx_id.as_str().cmp(b.tx_id.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TransactionId;

    fn tx(n: u64) -> TransactionId {
        TransactionId::generate(n, [0; 10])
    }

    fn triple(ts: i64, tx_ts: u64, val: i64) -> Triple {
        Triple::new(
            EntityId::new("https://e.com/alice").unwrap(),
            Predicate::new("age").unwrap(),
            TypedObject::Int64(val),
            ts,
            tx(tx_ts),
        )
        .unwrap()
    }

    #[test]
    fn latest_version_picks_greatest_timestamp() {
        let a = triple(1, 1, 10);
        let b = triple(5, 2, 20);
        let c = triple(3, 3, 30);
        let latest = latest_version([&a, &b, &c]).unwrap();
        assert_eq!(latest.object, TypedObject::Int64(20));
    }

    #[test]
    fn tombstone_detection() {
        let t = Triple::new(
            EntityId::new("https://e.com/alice").unwrap(),
            Predicate::new("age").unwrap(),
            TypedObject::Null,
            1,
            tx(1),
        )
        .unwrap();
        assert!(t.is_tombstone_value());
    }
}
