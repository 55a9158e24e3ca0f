//! Query planner (spec §4.8): walks the AST bottom-up into an ordered step
//! list, attaches an additive cost estimate and shard routing, and exposes
//! the canonical cache key the LRU plan cache keys on.

use graphdb_core::hash::fnv1a_str;
use graphdb_core::ids::{EntityId, Namespace, Predicate};
use graphdb_shard::Direction;

use crate::ast::{Ast, Field, FilterExpr};
use crate::error::PlanError;

/// Default assumed depth for an unbounded recurse, used only for costing —
/// the executor itself enforces the real `MAX_PATH_DEPTH` absolute cap.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Lookup { entity_ids: Vec<EntityId> },
    Traverse { predicate: Predicate },
    Reverse { predicate: Predicate },
    Filter { expr: FilterExpr },
    Expand { fields: Vec<Field> },
    Recurse { predicate: Predicate, direction: Direction, bound: Option<u32> },
}

impl PlanStep {
    fn cost(&self) -> f64 {
        match self {
            PlanStep::Lookup { entity_ids } => entity_ids.len() as f64,
            PlanStep::Traverse { .. } => 2.0,
            PlanStep::Reverse { .. } => 3.0,
            PlanStep::Filter { .. } => 1.0,
            PlanStep::Expand { fields } => 0.5 * fields.len() as f64,
            PlanStep::Recurse { bound, .. } => 5.0 * bound.unwrap_or(DEFAULT_MAX_DEPTH) as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub shards: Vec<String>,
    pub estimated_cost: f64,
    pub can_cache: bool,
    pub cache_key: Option<String>,
}

/// `"shard-" + hex(FNV1a(namespace_str))`, with short-form namespaces
/// promoted to a canonical placeholder URL first (spec §4.8).
pub fn shard_id_for_namespace(namespace: &Namespace) -> String {
    format!("shard-{:08x}", fnv1a_str(namespace.as_str()))
}

fn build_steps(ast: &Ast, namespace: &Namespace, steps: &mut Vec<PlanStep>) -> Result<(), PlanError> {
    match ast {
        Ast::Entity { value, .. } => {
            let entity_id = EntityId::new(&format!("{}/{value}", namespace.as_str()))
                .map_err(|e| PlanError::Unsupported(format!("invalid entity reference: {e}")))?;
            steps.push(PlanStep::Lookup { entity_ids: vec![entity_id] });
            Ok(())
        }
        Ast::Traverse { source, predicate } => {
            build_steps(source, namespace, steps)?;
            let predicate = Predicate::new(predicate).map_err(|e| PlanError::Unsupported(e.to_string()))?;
            steps.push(PlanStep::Traverse { predicate });
            Ok(())
        }
        Ast::Reverse { source, predicate } => {
            build_steps(source, namespace, steps)?;
            let predicate = Predicate::new(predicate).map_err(|e| PlanError::Unsupported(e.to_string()))?;
            steps.push(PlanStep::Reverse { predicate });
            Ok(())
        }
        Ast::Filter { source, expr } => {
            build_steps(source, namespace, steps)?;
            steps.push(PlanStep::Filter { expr: expr.clone() });
            Ok(())
        }
        Ast::Expand { source, fields } => {
            build_steps(source, namespace, steps)?;
            steps.push(PlanStep::Expand { fields: fields.clone() });
            Ok(())
        }
        Ast::Recurse { source, max_depth } => {
            // A recurse step absorbs the traversal/reverse it immediately
            // follows: `a.friends*` repeats the `friends` hop, it does not
            // add a separate one-hop step before recursing.
            match source.as_ref() {
                Ast::Traverse { source: inner, predicate } => {
                    build_steps(inner, namespace, steps)?;
                    let predicate = Predicate::new(predicate).map_err(|e| PlanError::Unsupported(e.to_string()))?;
                    steps.push(PlanStep::Recurse { predicate, direction: Direction::Outgoing, bound: *max_depth });
                    Ok(())
                }
                Ast::Reverse { source: inner, predicate } => {
                    build_steps(inner, namespace, steps)?;
                    let predicate = Predicate::new(predicate).map_err(|e| PlanError::Unsupported(e.to_string()))?;
                    steps.push(PlanStep::Recurse { predicate, direction: Direction::Incoming, bound: *max_depth });
                    Ok(())
                }
                other => Err(PlanError::Unsupported(format!(
                    "recursion must follow a traversal or reverse step, found {other:?}"
                ))),
            }
        }
    }
}

/// Merge adjacent `lookup` steps into one step carrying the union of
/// entity ids (spec §4.8 optimizations).
fn merge_adjacent_lookups(steps: Vec<PlanStep>) -> Vec<PlanStep> {
    let mut out: Vec<PlanStep> = Vec::with_capacity(steps.len());
    for step in steps {
        if let (Some(PlanStep::Lookup { entity_ids: prev_ids }), PlanStep::Lookup { entity_ids: new_ids }) =
            (out.last_mut(), &step)
        {
            for id in new_ids {
                if !prev_ids.contains(id) {
                    prev_ids.push(id.clone());
                }
            }
            continue;
        }
        out.push(step);
    }
    out
}

/// Plan `ast` (parsed from `query_text`) against `namespace`. The first
/// step is always a `lookup`; every subsequent step inherits the shard of
/// the query root, since cross-shard fan-out within a single query is not
/// part of this language.
pub fn plan(ast: &Ast, query_text: &str, namespace: &Namespace) -> Result<Plan, PlanError> {
    let mut steps = Vec::new();
    build_steps(ast, namespace, &mut steps)?;
    let steps = merge_adjacent_lookups(steps);
    let estimated_cost = steps.iter().map(PlanStep::cost).sum();
    let shard = shard_id_for_namespace(namespace);
    Ok(Plan {
        steps,
        shards: vec![shard],
        estimated_cost,
        can_cache: true,
        cache_key: Some(query_text.to_string()),
    })
}
