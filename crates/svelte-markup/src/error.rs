//! Parse error types.

use position_map::Span;
use thiserror::Error;

/// An error encountered while parsing markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Where the error was detected.
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of file: expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("unclosed tag: <{tag_name}>")]
    UnclosedTag { tag_name: String },

    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedClosingTag { expected: String, found: String },

    #[error("unexpected closing tag: </{tag_name}>")]
    UnexpectedClosingTag { tag_name: String },

    #[error("unclosed block: {{#{block}}}")]
    UnclosedBlock { block: String },

    #[error("unknown block: {{#{block}}}")]
    UnknownBlock { block: String },

    #[error("unexpected {{/{block}}} without an open block")]
    UnexpectedBlockClose { block: String },

    #[error("unexpected {{:{keyword}}} outside of a block")]
    UnexpectedContinuation { keyword: String },

    #[error("invalid expression: {message}")]
    InvalidExpression { message: String },

    #[error("duplicate {context} script")]
    DuplicateScript { context: &'static str },
}
