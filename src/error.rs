use thiserror::Error;

use crate::nucleus::ast::Span;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Parse error: {message}")]
    Parse { message: String, span: Span },

    #[error("Arity error: {head} expects {expected} argument(s), got {received}")]
    Arity {
        head: String,
        expected: String,
        received: usize,
        span: Span,
    },

    #[error("Type error: {head} argument {position}: expected {expected}, got {received}")]
    Type {
        head: String,
        position: usize,
        expected: String,
        received: String,
        span: Span,
    },

    #[error("Unbound symbol: {name}")]
    Unbound { name: String, span: Span },

    #[error("Invalid regex pattern \"{pattern}\": {message}")]
    Regex { pattern: String, message: String },

    #[error("Line {requested} out of range: document has {line_count} line(s)")]
    LineOutOfRange { requested: i64, line_count: usize },

    #[error("No document loaded")]
    NoDocument,

    #[error("Cannot bind reserved name: {name}")]
    ReservedName { name: String },

    #[error("Evaluation deadline exceeded")]
    Timeout,

    #[error("Synthesis requires at least 2 examples, got {received}")]
    NeedsMoreExamples { received: usize },

    #[error("Synthesis exhausted {candidates_explored} candidate(s) without an accepting composition")]
    NoCandidate {
        candidates_explored: usize,
        first_failing_example: Option<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Wire-level kind string, stable across versions.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Parse { .. } => "ParseError",
            EngineError::Arity { .. } => "ArityError",
            EngineError::Type { .. } => "TypeError",
            // A name denoting nothing is a kind error at its position; the
            // wire set stays closed.
            EngineError::Unbound { .. } => "TypeError",
            EngineError::Regex { .. } => "RegexError",
            EngineError::LineOutOfRange { .. } => "LineOutOfRange",
            EngineError::NoDocument => "NoDocument",
            EngineError::ReservedName { .. } => "ReservedName",
            EngineError::Timeout => "TimeoutError",
            EngineError::NeedsMoreExamples { .. } => "NeedsMoreExamples",
            EngineError::NoCandidate { .. } => "NoCandidate",
            EngineError::Io(_) => "IoError",
            EngineError::Internal(_) => "InternalError",
        }
    }

    /// Source span for parse/eval errors, when one exists.
    pub fn span(&self) -> Option<Span> {
        match self {
            EngineError::Parse { span, .. }
            | EngineError::Arity { span, .. }
            | EngineError::Type { span, .. }
            | EngineError::Unbound { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Only `Internal` poisons a session; everything else is recoverable at
    /// the turn boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }
}
