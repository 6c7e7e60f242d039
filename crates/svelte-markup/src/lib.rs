//! Svelte component markup parser for svelte-shim.
//!
//! Produces a [`Document`] holding the top-level script and style blocks and
//! the template node tree. Embedded JavaScript is never parsed here; each
//! expression is kept as trimmed text with its source span.
//!
//! # Example
//!
//! ```
//! use svelte_markup::{parse, Node};
//!
//! let result = parse("<script>let name = 'world';</script>\n<h1>Hello {name}!</h1>");
//! assert!(result.errors.is_empty());
//! assert!(result.document.instance_script.is_some());
//! assert!(matches!(result.document.fragment[1], Node::Element(_)));
//! ```

mod ast;
mod error;
pub mod lexer;
mod parser;

pub use ast::*;
pub use error::{ParseError, ParseErrorKind};
pub use position_map::Span;

/// The result of parsing a component.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    /// Recoverable errors; the document holds whatever could be parsed.
    pub errors: Vec<ParseError>,
}

/// Parses a component source into a [`Document`].
pub fn parse(source: &str) -> ParseResult {
    parser::Parser::new(source).parse()
}
