//! Typed comparison operators shared by the shard's predicate-scan filter
//! (spec §4.6) and the executor's in-memory entity filter (spec §4.9): one
//! evaluation rule set so the two layers can't silently diverge.

use crate::object::TypedObject;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FromStr for FilterOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" => FilterOp::Eq,
            "!=" => FilterOp::Ne,
            "<" => FilterOp::Lt,
            "<=" => FilterOp::Le,
            ">" => FilterOp::Gt,
            ">=" => FilterOp::Ge,
            _ => return Err(()),
        })
    }
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// `=`/`!=` compare by value identity across matching variants.
/// `<,<=,>,>=` are defined only when both operands are numeric — on a
/// non-numeric operand they evaluate to `false`, never an error (spec
/// §4.6, boundary behavior in §8).
pub fn compare(op: FilterOp, object: &TypedObject, value: &TypedObject) -> bool {
    match op {
        FilterOp::Eq => object == value,
        FilterOp::Ne => object != value,
        FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
            match (object.as_numeric(), value.as_numeric()) {
                (Some(a), Some(b)) => match op {
                    FilterOp::Lt => a < b,
                    FilterOp::Le => a <= b,
                    FilterOp::Gt => a > b,
                    FilterOp::Ge => a >= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
    }
}
