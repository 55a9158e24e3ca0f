//! BFS query executor (spec §4.9, component C9): drives plan steps against
//! a single shard actor, accumulating a frontier of materialized entities
//! while a visited-set guarantees termination on cyclic graphs.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use graphdb_core::entity::{Entity, FieldValue};
use graphdb_core::filter::{compare, FilterOp};
use graphdb_core::ids::{EntityId, Predicate};
use graphdb_core::object::TypedObject;
use graphdb_shard::{Direction, ShardActor};

use crate::ast::{FilterExpr, FilterValue};
use crate::cursor::CursorState;
use crate::error::ExecError;
use crate::planner::{Plan, PlanStep};

/// Absolute cap on `recurse`/traversal depth regardless of caller request.
pub const MAX_PATH_DEPTH: u32 = 100;
/// Default per-execution timeout when the caller does not specify one.
pub const MAX_TRAVERSAL_TIME_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub max_results: usize,
    pub start_offset: u64,
    pub timeout_ms: Option<u64>,
    pub cursor: Option<String>,
}

impl Default for ExecutionRequest {
    fn default() -> Self {
        ExecutionRequest { max_results: 100, start_offset: 0, timeout_ms: None, cursor: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub entities: Vec<Entity>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

fn to_typed_object(v: &FilterValue) -> TypedObject {
    match v {
        FilterValue::Num(n) => TypedObject::Float64(*n),
        FilterValue::Bool(b) => TypedObject::Bool(*b),
        FilterValue::Str(s) | FilterValue::Ident(s) => TypedObject::String(s.clone()),
    }
}

/// Equality across a query-literal value and a stored `TypedObject`.
/// Numeric literals match any numeric variant by value (the query
/// language carries no width information); strings and booleans require
/// an exact variant match, matching the strict-equality rule applied to
/// stored triples elsewhere in the system.
fn values_equal(object: &TypedObject, value: &FilterValue) -> bool {
    match value {
        FilterValue::Num(n) => object.as_numeric() == Some(*n),
        FilterValue::Bool(b) => matches!(object, TypedObject::Bool(x) if x == b),
        FilterValue::Str(s) | FilterValue::Ident(s) => matches!(object, TypedObject::String(x) if x == s),
    }
}

fn match_single(op: FilterOp, object: &TypedObject, value: &FilterValue) -> bool {
    match op {
        FilterOp::Eq => values_equal(object, value),
        FilterOp::Ne => !values_equal(object, value),
        _ => compare(op, object, &to_typed_object(value)),
    }
}

fn field_matches(entity: &Entity, field: &str, op: FilterOp, value: &FilterValue) -> bool {
    match entity.fields.get(field) {
        None => false,
        Some(FieldValue::Single(object)) => match_single(op, object, value),
        Some(FieldValue::Many(objects)) => objects.iter().any(|o| match_single(op, o, value)),
    }
}

/// Evaluate a filter tree against a materialized entity reached at
/// `depth` hops from the query root. `and`/`or` short-circuit via Rust's
/// own `&&`/`||` (spec §4.9: "and requires left true, or requires left false").
fn eval_filter(expr: &FilterExpr, entity: &Entity, depth: u32) -> bool {
    match expr {
        FilterExpr::And(a, b) => eval_filter(a, entity, depth) && eval_filter(b, entity, depth),
        FilterExpr::Or(a, b) => eval_filter(a, entity, depth) || eval_filter(b, entity, depth),
        FilterExpr::Depth { op, value } => compare(*op, &TypedObject::Float64(depth as f64), &TypedObject::Float64(*value)),
        FilterExpr::Cmp { field, op, value } => field_matches(entity, field, *op, value),
    }
}

/// One outgoing/incoming hop from every entity currently in `frontier`.
/// Entities already in `visited` are never re-expanded or re-emitted,
/// which is what guarantees termination over a cyclic graph.
fn step_traverse(
    shard: &ShardActor,
    frontier: &[Entity],
    predicate: &Predicate,
    direction: Direction,
    depths: &mut HashMap<EntityId, u32>,
    visited: &mut HashSet<EntityId>,
) -> Vec<Entity> {
    let mut next = Vec::new();
    let mut seen_this_step = HashSet::new();
    for from in frontier {
        let depth = depths.get(&from.id).copied().unwrap_or(0);
        if depth >= MAX_PATH_DEPTH {
            continue;
        }
        for entity in shard.traverse(&from.id, predicate, direction) {
            if visited.contains(&entity.id) || !seen_this_step.insert(entity.id.clone()) {
                continue;
            }
            depths.insert(entity.id.clone(), depth + 1);
            visited.insert(entity.id.clone());
            next.push(entity);
        }
    }
    next
}

#[allow(clippy::too_many_arguments)]
fn step_recurse(
    shard: &ShardActor,
    start_frontier: &[Entity],
    predicate: &Predicate,
    direction: Direction,
    bound: Option<u32>,
    depths: &mut HashMap<EntityId, u32>,
    visited: &mut HashSet<EntityId>,
    started: Instant,
    deadline: Duration,
) -> Vec<Entity> {
    let limit = bound.unwrap_or(MAX_PATH_DEPTH).min(MAX_PATH_DEPTH);
    let mut collected = Vec::new();
    let mut frontier = start_frontier.to_vec();
    let mut round = 0u32;
    while round < limit && !frontier.is_empty() {
        if started.elapsed() >= deadline {
            break;
        }
        let next = step_traverse(shard, &frontier, predicate, direction, depths, visited);
        if next.is_empty() {
            break;
        }
        collected.extend(next.iter().cloned());
        frontier = next;
        round += 1;
    }
    collected
}

/// Execute `plan` against `shard`. `query_hash` must be the hash of this
/// same plan (spec §4.9 cursor validation). `now_ms` drives cursor
/// freshness checks and is supplied by the caller rather than read from
/// the clock, keeping this function pure and replayable.
pub fn execute(
    shard: &ShardActor,
    plan: &Plan,
    query_hash: u32,
    request: ExecutionRequest,
    now_ms: i64,
) -> Result<ExecutionResult, ExecError> {
    let start_offset = match &request.cursor {
        Some(raw) => {
            let cursor = CursorState::decode(raw)?;
            cursor.validate(query_hash, now_ms)?;
            cursor.offset
        }
        None => request.start_offset,
    };

    let deadline = Duration::from_millis(request.timeout_ms.unwrap_or(MAX_TRAVERSAL_TIME_MS));
    let started = Instant::now();

    let mut frontier: Vec<Entity> = Vec::new();
    let mut depths: HashMap<EntityId, u32> = HashMap::new();
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut timed_out = false;

    for step in &plan.steps {
        if started.elapsed() >= deadline {
            timed_out = true;
            break;
        }
        match step {
            PlanStep::Lookup { entity_ids } => {
                frontier = shard.lookup(entity_ids);
                for e in &frontier {
                    depths.insert(e.id.clone(), 0);
                    visited.insert(e.id.clone());
                }
            }
            PlanStep::Traverse { predicate } => {
                frontier = step_traverse(shard, &frontier, predicate, Direction::Outgoing, &mut depths, &mut visited);
            }
            PlanStep::Reverse { predicate } => {
                frontier = step_traverse(shard, &frontier, predicate, Direction::Incoming, &mut depths, &mut visited);
            }
            PlanStep::Filter { expr } => {
                frontier.retain(|e| eval_filter(expr, e, depths.get(&e.id).copied().unwrap_or(0)));
            }
            PlanStep::Expand { fields } => {
                let ids: Vec<EntityId> = frontier.iter().map(|e| e.id.clone()).collect();
                let field_names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
                frontier = shard.expand(&ids, &field_names);
            }
            PlanStep::Recurse { predicate, direction, bound } => {
                frontier = step_recurse(shard, &frontier, predicate, *direction, *bound, &mut depths, &mut visited, started, deadline);
                if started.elapsed() >= deadline {
                    timed_out = true;
                }
            }
        }
    }

    // Deterministic order so pagination is stable across calls.
    frontier.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

    let start = start_offset as usize;
    let (page, size_has_more) = if start >= frontier.len() {
        (Vec::new(), false)
    } else {
        let end = (start + request.max_results).min(frontier.len());
        let has_more = frontier.len() > start + request.max_results;
        (frontier[start..end].to_vec(), has_more)
    };

    let has_more = size_has_more || timed_out;
    let cursor = if has_more {
        Some(
            CursorState {
                last_id: page.last().map(|e| e.id.as_str().to_string()).unwrap_or_default(),
                query_hash,
                ts: now_ms,
                offset: start as u64 + page.len() as u64,
            }
            .encode(),
        )
    } else {
        None
    };

    Ok(ExecutionResult { entities: page, has_more, cursor })
}
