//! Error taxonomy for the query pipeline (spec §7 items 2–4): parse
//! errors carry position + depth-limit subkind; planning is reserved;
//! execution errors name the offending shard/cursor/timeout condition.

use thiserror::Error;

/// Static nesting limit for recursive grammar constructs (spec §4.7).
pub const MAX_PARSE_DEPTH: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

fn position_of(offset: usize, src: &str) -> Position {
    let mut line = 1usize;
    let mut column = 1usize;
    for c in src.chars().take(offset) {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    Position { offset, line, column }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Syntax { pos: Position, message: String },
    DepthExceeded { pos: Position },
    Empty,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax { pos, message } => {
                write!(f, "syntax error at line {}, column {}: {message}", pos.line, pos.column)
            }
            ParseError::DepthExceeded { pos } => write!(
                f,
                "query nesting exceeds the maximum depth of {MAX_PARSE_DEPTH} at line {}, column {}",
                pos.line, pos.column
            ),
            ParseError::Empty => write!(f, "query is empty or whitespace-only"),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn syntax(offset: usize, src: &str, message: &str) -> Self {
        ParseError::Syntax {
            pos: position_of(offset, src),
            message: message.to_string(),
        }
    }

    pub fn depth(offset: usize, src: &str) -> Self {
        ParseError::DepthExceeded {
            pos: position_of(offset, src),
        }
    }

    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self, ParseError::DepthExceeded { .. })
    }
}

/// Reserved for unsupported AST constructs; none are defined today
/// (spec §4.8, §7 item 3).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("unsupported query construct: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("shard {shard_id} returned HTTP {status} for entities {entities:?}")]
    ShardRequest {
        shard_id: String,
        status: u16,
        entities: Vec<String>,
    },

    #[error("cursor is not valid base64/JSON")]
    CursorMalformed,

    #[error("cursor query mismatch")]
    CursorQueryMismatch,

    #[error("cursor expired")]
    CursorExpired,

    #[error(transparent)]
    Core(#[from] graphdb_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_is_one_based() {
        let err = ParseError::syntax(0, "abc", "x");
        match err {
            ParseError::Syntax { pos, .. } => assert_eq!((pos.line, pos.column), (1, 1)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn tracks_line_breaks() {
        let err = ParseError::syntax(4, "ab\ncd", "x");
        match err {
            ParseError::Syntax { pos, .. } => assert_eq!((pos.line, pos.column), (2, 2)),
            _ => unreachable!(),
        }
    }
}
