//! AST for the path-query language (spec §4.7).

use graphdb_core::filter::FilterOp;

/// A value literal inside a filter comparison. Per spec §9 open question,
/// bare identifiers are accepted as strings (`status = active` matches the
/// literal string `"active"`) — preserved for compatibility, flagged here.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Num(f64),
    Bool(bool),
    /// A bare identifier used as a value, treated as a string (see above).
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    /// `depth <op> NUMBER`.
    Depth { op: FilterOp, value: f64 },
    /// `IDENT <op> value`.
    Cmp { field: String, op: FilterOp, value: FilterValue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub nested: Option<Vec<Field>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// `IDENT ':' value` — entity lookup. `ns_hint` is the part before
    /// `:`, `value` the part after (identifier, number, or string).
    Entity { ns_hint: String, value: String },
    Traverse { source: Box<Ast>, predicate: String },
    Reverse { source: Box<Ast>, predicate: String },
    Filter { source: Box<Ast>, expr: FilterExpr },
    /// `maxDepth = None` means unbounded recursion (spec §4.7 `*`).
    Recurse { source: Box<Ast>, max_depth: Option<u32> },
    Expand { source: Box<Ast>, fields: Vec<Field> },
}

/// Result of `countHops`: a finite number of hops, or "infinite" for an
/// unbounded recursive step (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopCount {
    Bounded(u32),
    Infinite,
}

impl std::fmt::Display for HopCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HopCount::Bounded(n) => write!(f, "{n}"),
            HopCount::Infinite => write!(f, "infinite"),
        }
    }
}

/// `countHops`: 0 for entity, `1 + countHops(source)` for traverse/reverse,
/// passes through filter/expand, `maxDepth` for a bounded recurse,
/// "infinite" for an unbounded one (spec §4.7).
pub fn count_hops(ast: &Ast) -> HopCount {
    match ast {
        Ast::Entity { .. } => HopCount::Bounded(0),
        Ast::Traverse { source, .. } | Ast::Reverse { source, .. } => match count_hops(source) {
            HopCount::Bounded(n) => HopCount::Bounded(n + 1),
            HopCount::Infinite => HopCount::Infinite,
        },
        Ast::Filter { source, .. } | Ast::Expand { source, .. } => count_hops(source),
        Ast::Recurse { max_depth: Some(d), .. } => HopCount::Bounded(*d),
        Ast::Recurse { max_depth: None, .. } => HopCount::Infinite,
    }
}

/// Debug round-trip: equivalent queries may re-parse to an AST equal in
/// type structure, but token-level whitespace need not be preserved
/// (spec §4.7 `stringify`).
pub fn stringify(ast: &Ast) -> String {
    match ast {
        Ast::Entity { ns_hint, value } => format!("{ns_hint}:{value}"),
        Ast::Traverse { source, predicate } => format!("{}.{predicate}", stringify(source)),
        Ast::Reverse { source, predicate } => format!("{} <- {predicate}", stringify(source)),
        Ast::Filter { source, expr } => format!("{}[?{}]", stringify(source), stringify_filter(expr)),
        Ast::Recurse { source, max_depth } => match max_depth {
            Some(d) => format!("{}*[depth <= {d}]", stringify(source)),
            None => format!("{}*", stringify(source)),
        },
        Ast::Expand { source, fields } => format!("{}{{{}}}", stringify(source), stringify_fields(fields)),
    }
}

fn stringify_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| match &f.nested {
            Some(nested) => format!("{}{{{}}}", f.name, stringify_fields(nested)),
            None => f.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn stringify_value(v: &FilterValue) -> String {
    match v {
        FilterValue::Str(s) => format!("'{s}'"),
        FilterValue::Num(n) => n.to_string(),
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Ident(s) => s.clone(),
    }
}

fn stringify_filter(expr: &FilterExpr) -> String {
    match expr {
        FilterExpr::And(a, b) => format!("({} and {})", stringify_filter(a), stringify_filter(b)),
        FilterExpr::Or(a, b) => format!("({} or {})", stringify_filter(a), stringify_filter(b)),
        FilterExpr::Depth { op, value } => format!("depth {} {value}", op.as_str()),
        FilterExpr::Cmp { field, op, value } => format!("{field} {} {}", op.as_str(), stringify_value(value)),
    }
}
