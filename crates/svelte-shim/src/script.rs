//! Parsing of TypeScript/JavaScript sources with swc.

use std::sync::Arc;
use swc_common::{BytePos, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::Module;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, TsSyntax};

/// A parsed module plus what is needed to turn swc positions into byte
/// offsets of the parsed text.
pub struct ParsedScript {
    pub module: Module,
    file_start: BytePos,
}

/// A parse failure with the offset where swc gave up.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub offset: usize,
}

impl ScriptError {
    fn from_swc(err: &swc_ecma_parser::error::Error, file_start: BytePos) -> Self {
        Self {
            message: format!("{:?}", err.kind()),
            offset: err.span().lo.0.saturating_sub(file_start.0) as usize,
        }
    }
}

impl ParsedScript {
    /// Parses `source` as an ES module, with TypeScript syntax when `typed`.
    pub fn parse(name: &str, source: &str, typed: bool) -> Result<Self, ScriptError> {
        let cm: Arc<SourceMap> = Default::default();
        let fm = cm.new_source_file(FileName::Custom(name.to_string()).into(), source.to_string());
        let file_start = fm.start_pos;
        let syntax = if typed {
            Syntax::Typescript(TsSyntax {
                tsx: false,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: false,
                ..Default::default()
            })
        };

        let mut parser = Parser::new(syntax, StringInput::from(&*fm), None);
        let module = parser
            .parse_module()
            .map_err(|err| ScriptError::from_swc(&err, file_start))?;
        // Recovered errors still leave an unreliable tree.
        if let Some(err) = parser.take_errors().first() {
            return Err(ScriptError::from_swc(err, file_start));
        }
        Ok(Self { module, file_start })
    }

    /// Byte offset of a span's start in the parsed text.
    #[inline]
    pub fn lo(&self, span: Span) -> usize {
        span.lo.0.saturating_sub(self.file_start.0) as usize
    }

    /// Byte offset of a span's end in the parsed text.
    #[inline]
    pub fn hi(&self, span: Span) -> usize {
        span.hi.0.saturating_sub(self.file_start.0) as usize
    }
}
