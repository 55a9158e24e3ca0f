//! Top-level facade over the graph database workspace: a `GraphDb` handle
//! that owns a registry of shard actors, the process-local plan cache, and
//! an optional CDC coordinator, and exposes query execution as one call.
//!
//! Each component crate (`graphdb-core`, `graphdb-graphcol`,
//! `graphdb-storage`, `graphdb-shard`, `graphdb-query`, `graphdb-cdc`) is
//! usable standalone; this crate only wires them together the way an
//! embedding application would.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, instrument};

use graphdb_core::ids::Namespace;
use graphdb_query::{plan_hash, ExecutionRequest, ExecutionResult, PlanCache};
use graphdb_shard::{ShardActor, ShardConfig};

pub use graphdb_cdc::{CdcCoordinator, CdcMessage, ObjectStore, ShardTransport};
pub use graphdb_core::entity::{expand_refs, Entity, ExpandedEntity, ExpandedField, FieldValue, RefExpansion};
pub use graphdb_core::ids::{EntityId, Predicate, TransactionId};
pub use graphdb_core::object::TypedObject;
pub use graphdb_core::triple::Triple;
pub use graphdb_query::{parse, Ast, ExecError, ParseError, Plan, PlanError};

const DEFAULT_PLAN_CACHE_CAPACITY: usize = 256;

/// Top-level error composing every crate boundary's error type, mirroring
/// how the teacher composes its top-level error from per-layer errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] graphdb_core::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Shard(#[from] graphdb_shard::ShardError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A graph database handle: a registry of shard actors keyed by shard id,
/// plus the plan cache shared across queries issued through this handle.
///
/// Per spec §5, the plan cache is process-local and mutated only from the
/// thread that owns it; we wrap it in a `Mutex` here so `GraphDb` itself can
/// be shared across threads (e.g. behind an `Arc`) without asking every
/// caller to serialize access by hand.
pub struct GraphDb {
    shards: RwLock<HashMap<String, Arc<ShardActor>>>,
    plan_cache: Mutex<PlanCache>,
    shard_config: ShardConfig,
}

impl Default for GraphDb {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphDb {
    pub fn new() -> Self {
        GraphDb {
            shards: RwLock::new(HashMap::new()),
            plan_cache: Mutex::new(PlanCache::new(DEFAULT_PLAN_CACHE_CAPACITY)),
            shard_config: ShardConfig::default(),
        }
    }

    pub fn with_shard_config(shard_config: ShardConfig) -> Self {
        GraphDb {
            shards: RwLock::new(HashMap::new()),
            plan_cache: Mutex::new(PlanCache::new(DEFAULT_PLAN_CACHE_CAPACITY)),
            shard_config,
        }
    }

    /// The shard actor owning `namespace`, creating it on first use. Shard
    /// ids are derived the same way the planner routes queries
    /// (`"shard-" + hex(FNV1a(namespace))`), so a namespace always lands on
    /// the same shard within one `GraphDb` instance.
    pub fn shard_for_namespace(&self, namespace: &Namespace) -> Arc<ShardActor> {
        let shard_id = graphdb_query::shard_id_for_namespace(namespace);
        if let Some(shard) = self.shards.read().get(&shard_id) {
            return shard.clone();
        }
        let mut shards = self.shards.write();
        shards
            .entry(shard_id.clone())
            .or_insert_with(|| Arc::new(ShardActor::with_config(shard_id, namespace.clone(), self.shard_config.clone())))
            .clone()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    /// Invalidate the plan cache; call after any schema/DDL-equivalent
    /// change (spec §4.8).
    pub fn invalidate_plan_cache(&self) {
        self.plan_cache.lock().invalidate();
    }

    /// Parse, plan (consulting the cache), and execute `query_text` against
    /// the shard owning `namespace`. This is the full C7 → C8 → C9 pipeline
    /// from spec §4, single-shard case.
    #[instrument(skip(self, request), fields(namespace = namespace.as_str()))]
    pub fn query(&self, query_text: &str, namespace: &Namespace, request: ExecutionRequest, now_ms: i64) -> Result<ExecutionResult> {
        let shard = self.shard_for_namespace(namespace);

        let plan = {
            let mut cache = self.plan_cache.lock();
            match cache.get(query_text) {
                Some(cached) => {
                    debug!(query = query_text, "plan cache hit");
                    cached
                }
                None => {
                    let ast = parse(query_text)?;
                    let built = graphdb_query::plan(&ast, query_text, namespace)?;
                    cache.set(query_text.to_string(), built.clone());
                    built
                }
            }
        };

        let hash = plan_hash(&plan);
        let result = graphdb_query::execute(&shard, &plan, hash, request, now_ms)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_core::ids::TransactionId as Tx;

    fn ns() -> Namespace {
        Namespace::new("https://e.com").unwrap()
    }

    #[test]
    fn same_namespace_reuses_the_same_shard() {
        let db = GraphDb::new();
        let a = db.shard_for_namespace(&ns());
        let b = db.shard_for_namespace(&ns());
        assert_eq!(a.shard_id(), b.shard_id());
        assert_eq!(db.shard_count(), 1);
    }

    #[test]
    fn query_executes_end_to_end() {
        let db = GraphDb::new();
        let shard = db.shard_for_namespace(&ns());
        shard
            .insert(vec![Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("name").unwrap(),
                TypedObject::String("Alice".into()),
                1,
                Tx::generate(1, [0; 10]),
            )
            .unwrap()])
            .unwrap();

        let result = db.query("e:alice", &ns(), ExecutionRequest::default(), 0).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].id.as_str(), "https://e.com/alice");
    }

    #[test]
    fn plan_cache_invalidation_forces_replan() {
        let db = GraphDb::new();
        let shard = db.shard_for_namespace(&ns());
        shard
            .insert(vec![Triple::new(
                EntityId::new("https://e.com/bob").unwrap(),
                Predicate::new("age").unwrap(),
                TypedObject::Int64(1),
                1,
                Tx::generate(2, [0; 10]),
            )
            .unwrap()])
            .unwrap();

        assert!(db.query("e:bob", &ns(), ExecutionRequest::default(), 0).is_ok());
        db.invalidate_plan_cache();
        assert!(db.query("e:bob", &ns(), ExecutionRequest::default(), 0).is_ok());
    }
}
