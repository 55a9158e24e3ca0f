//! Deterministic plan hash (spec §4.9): order- and shape-independent over
//! entity-id/field arrays and filter trees, then FNV-1a over the canonical
//! string. The same logical query always yields the same hash regardless
//! of how its arrays or commutative filter operands were originally ordered.

use graphdb_core::hash::fnv1a_str;

use crate::ast::{Field, FilterExpr, FilterValue};
use crate::planner::{Plan, PlanStep};

fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn canonical_value(v: &FilterValue) -> String {
    match v {
        FilterValue::Str(s) => format!("s:{s}"),
        FilterValue::Num(n) => format!("n:{}", fmt_num(*n)),
        FilterValue::Bool(b) => format!("b:{b}"),
        FilterValue::Ident(s) => format!("i:{s}"),
    }
}

fn canonical_filter(expr: &FilterExpr) -> String {
    match expr {
        FilterExpr::And(a, b) => {
            let mut parts = [canonical_filter(a), canonical_filter(b)];
            parts.sort();
            format!("and({},{})", parts[0], parts[1])
        }
        FilterExpr::Or(a, b) => {
            let mut parts = [canonical_filter(a), canonical_filter(b)];
            parts.sort();
            format!("or({},{})", parts[0], parts[1])
        }
        FilterExpr::Depth { op, value } => format!("depth{}{}", op.as_str(), fmt_num(*value)),
        FilterExpr::Cmp { field, op, value } => format!("{field}{}{}", op.as_str(), canonical_value(value)),
    }
}

fn canonical_field(f: &Field) -> String {
    match &f.nested {
        Some(nested) => {
            let mut inner: Vec<String> = nested.iter().map(canonical_field).collect();
            inner.sort();
            format!("{}{{{}}}", f.name, inner.join(","))
        }
        None => f.name.clone(),
    }
}

fn canonical_step(step: &PlanStep) -> String {
    match step {
        PlanStep::Lookup { entity_ids } => {
            let mut ids: Vec<&str> = entity_ids.iter().map(|i| i.as_str()).collect();
            ids.sort_unstable();
            format!("lookup:{}", ids.join(","))
        }
        PlanStep::Traverse { predicate } => format!("traverse:{}", predicate.as_str()),
        PlanStep::Reverse { predicate } => format!("reverse:{}", predicate.as_str()),
        PlanStep::Filter { expr } => format!("filter:{}", canonical_filter(expr)),
        PlanStep::Expand { fields } => {
            let mut names: Vec<String> = fields.iter().map(canonical_field).collect();
            names.sort();
            format!("expand:{}", names.join(","))
        }
        PlanStep::Recurse { predicate, direction, bound } => {
            let bound = bound.map(|b| b.to_string()).unwrap_or_else(|| "inf".to_string());
            format!("recurse:{}:{:?}:{bound}", predicate.as_str(), direction)
        }
    }
}

/// Canonicalize and hash a plan's step list. Two plans built from
/// differently-ordered but semantically identical query text produce the
/// same hash.
pub fn plan_hash(plan: &Plan) -> u32 {
    let canonical: String = plan.steps.iter().map(canonical_step).collect::<Vec<_>>().join(";");
    fnv1a_str(&canonical)
}
