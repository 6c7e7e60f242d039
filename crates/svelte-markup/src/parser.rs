//! Recursive descent parser over the raw component text.

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer;
use crate::ParseResult;
use position_map::Span;
use smol_str::SmolStr;

/// HTML void elements never have children or closing tags.
const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void_element(name: &str) -> bool {
    HTML_VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    pos: usize,
    /// Nesting depth of elements and blocks; scripts and styles are only
    /// hoisted into the document at depth zero.
    depth: usize,
    document: Document,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            depth: 0,
            document: Document::default(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> ParseResult {
        loop {
            let nodes = self.parse_nodes();
            self.document.fragment.extend(nodes);
            if self.at_end() {
                break;
            }
            self.recover_stray_closer();
        }
        self.document.span = Span::from_usize(0, self.source.len());
        ParseResult {
            document: self.document,
            errors: self.errors,
        }
    }

    // === Cursor helpers ===

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.source.len() - trimmed.len();
    }

    /// Moves past the next occurrence of `c`, or to the end of input.
    fn skip_past(&mut self, c: char) {
        self.pos = match self.rest().find(c) {
            Some(idx) => self.pos + idx + c.len_utf8(),
            None => self.source.len(),
        };
    }

    fn read_word(&mut self) -> &'src str {
        let rest = self.rest();
        let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn error(&mut self, kind: ParseErrorKind, start: usize) {
        let end = self.pos.max(start);
        self.errors
            .push(ParseError::new(kind, Span::from_usize(start, end)));
    }

    fn at_closer(&self) -> bool {
        self.starts_with("</") || self.starts_with("{/") || self.starts_with("{:")
    }

    fn at_tag_open(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn at_continuation(&self, keyword: &str) -> bool {
        self.rest()
            .strip_prefix("{:")
            .and_then(|r| r.strip_prefix(keyword))
            .is_some_and(|r| !r.starts_with(is_ident_char))
    }

    // === Nodes ===

    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        while !self.at_end() && !self.at_closer() {
            let node = if self.starts_with("<!--") {
                Some(self.parse_comment())
            } else if self.at_tag_open() {
                self.parse_element()
            } else if self.starts_with("{#") {
                self.parse_block()
            } else if self.starts_with("{@") {
                self.parse_special_tag()
            } else if self.starts_with("{") {
                self.parse_mustache()
            } else {
                Some(self.parse_text())
            };
            nodes.extend(node);
        }
        nodes
    }

    fn parse_children(&mut self) -> Vec<Node> {
        self.depth += 1;
        let nodes = self.parse_nodes();
        self.depth -= 1;
        nodes
    }

    fn recover_stray_closer(&mut self) {
        let start = self.pos;
        if self.eat("</") {
            let name = self.read_word().to_string();
            self.skip_past('>');
            self.error(ParseErrorKind::UnexpectedClosingTag { tag_name: name }, start);
        } else if self.eat("{/") {
            let block = self.read_word().to_string();
            self.skip_past('}');
            self.error(ParseErrorKind::UnexpectedBlockClose { block }, start);
        } else {
            self.pos += 2;
            let keyword = self.read_word().to_string();
            self.skip_past('}');
            self.error(ParseErrorKind::UnexpectedContinuation { keyword }, start);
        }
    }

    fn parse_text(&mut self) -> Node {
        let start = self.pos;
        let mut chars = self.rest().char_indices().peekable();
        // Always consume the first character so stray `<` makes progress.
        let mut end = self.source.len();
        chars.next();
        while let Some(&(idx, c)) = chars.peek() {
            let here = start + idx;
            if c == '{' {
                end = here;
                break;
            }
            if c == '<' {
                self.pos = here;
                if self.at_tag_open() || self.starts_with("</") || self.starts_with("<!--") {
                    end = here;
                    break;
                }
            }
            chars.next();
        }
        self.pos = end;
        Node::Text(Text {
            span: Span::from_usize(start, end),
            data: self.source[start..end].to_string(),
        })
    }

    fn parse_comment(&mut self) -> Node {
        let start = self.pos;
        self.pos += "<!--".len();
        let (data_end, end) = match self.rest().find("-->") {
            Some(idx) => (self.pos + idx, self.pos + idx + "-->".len()),
            None => {
                self.pos = self.source.len();
                self.error(
                    ParseErrorKind::UnexpectedEof {
                        expected: "-->".to_string(),
                    },
                    start,
                );
                (self.source.len(), self.source.len())
            }
        };
        let data = self.source[start + "<!--".len()..data_end].to_string();
        self.pos = end;
        Node::Comment(Comment {
            span: Span::from_usize(start, end),
            data,
        })
    }

    /// Parses the expression after an opening `{` (already consumed) up to
    /// its matching `}`.
    fn parse_expression_body(&mut self, open: usize) -> Option<Expression> {
        let body_start = self.pos;
        match lexer::closing_brace(self.rest()) {
            Some(rel) => {
                self.pos = body_start + rel + 1;
                Some(Expression::trimmed(self.source, body_start, body_start + rel))
            }
            None => {
                self.pos = self.source.len();
                self.error(
                    ParseErrorKind::UnexpectedEof {
                        expected: "}".to_string(),
                    },
                    open,
                );
                None
            }
        }
    }

    fn parse_mustache(&mut self) -> Option<Node> {
        let start = self.pos;
        self.pos += 1;
        let expression = self.parse_expression_body(start)?;
        if expression.is_empty() {
            self.error(
                ParseErrorKind::InvalidExpression {
                    message: "empty expression".to_string(),
                },
                start,
            );
            return None;
        }
        Some(Node::Mustache(Mustache {
            span: Span::from_usize(start, self.pos),
            expression,
        }))
    }

    fn parse_special_tag(&mut self) -> Option<Node> {
        let start = self.pos;
        self.pos += 2;
        let keyword = self.read_word();
        let expression = self.parse_expression_body(start)?;
        let kind = match keyword {
            "html" => TagKind::Html,
            "debug" => TagKind::Debug,
            "const" => TagKind::Const,
            other => {
                self.error(
                    ParseErrorKind::InvalidExpression {
                        message: format!("unknown tag @{other}"),
                    },
                    start,
                );
                return None;
            }
        };
        Some(Node::Tag(SpecialTag {
            span: Span::from_usize(start, self.pos),
            kind,
            expression: (!expression.is_empty()).then_some(expression),
        }))
    }

    // === Elements ===

    fn parse_element(&mut self) -> Option<Node> {
        let start = self.pos;
        self.pos += 1;
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        let name = SmolStr::new(&rest[..name_len]);
        self.pos += name_len;

        let attributes = self.parse_attributes();
        let self_closing = if self.eat("/>") {
            true
        } else if self.eat(">") {
            false
        } else {
            self.error(
                ParseErrorKind::UnclosedTag {
                    tag_name: name.to_string(),
                },
                start,
            );
            true
        };

        if !self_closing && (name == "script" || name == "style") {
            return self.parse_raw_block(start, name, attributes);
        }

        let children = if self_closing || is_void_element(&name) {
            Vec::new()
        } else {
            let children = self.parse_children();
            self.parse_closing_tag(&name, start);
            children
        };

        Some(Node::Element(Element {
            span: Span::from_usize(start, self.pos),
            kind: ElementKind::from_name(&name),
            name,
            attributes,
            children,
            self_closing,
        }))
    }

    fn parse_closing_tag(&mut self, name: &str, start: usize) {
        let Some(after) = self.rest().strip_prefix("</") else {
            self.error(
                ParseErrorKind::UnclosedTag {
                    tag_name: name.to_string(),
                },
                start,
            );
            return;
        };
        let found = after
            .split(|c: char| c.is_whitespace() || c == '>')
            .next()
            .unwrap_or_default();
        if found == name {
            self.skip_past('>');
        } else {
            // Leave the closer for an ancestor that may own it.
            self.error(
                ParseErrorKind::MismatchedClosingTag {
                    expected: name.to_string(),
                    found: found.to_string(),
                },
                start,
            );
        }
    }

    /// Parses the raw content of a `<script>` or `<style>` element whose
    /// opening tag has been consumed.
    fn parse_raw_block(
        &mut self,
        start: usize,
        name: SmolStr,
        attributes: Vec<Attribute>,
    ) -> Option<Node> {
        let open_end = self.pos;
        let closer = format!("</{name}");
        let (content_end, end) = match self.rest().find(&closer) {
            Some(idx) => {
                let content_end = self.pos + idx;
                self.pos = content_end;
                self.skip_past('>');
                (content_end, self.pos)
            }
            None => {
                self.pos = self.source.len();
                self.error(
                    ParseErrorKind::UnclosedTag {
                        tag_name: name.to_string(),
                    },
                    start,
                );
                (self.source.len(), self.source.len())
            }
        };
        let span = Span::from_usize(start, end);
        let content_span = Span::from_usize(open_end, content_end);

        if self.depth > 0 {
            let text = Node::Text(Text {
                span: content_span,
                data: content_span.text(self.source).to_string(),
            });
            return Some(Node::Element(Element {
                span,
                name,
                kind: ElementKind::Html,
                attributes,
                children: vec![text],
                self_closing: false,
            }));
        }

        if name == "style" {
            self.document.styles.push(Style { span, content_span });
            return None;
        }

        let script = Script {
            span,
            open_tag: Span::from_usize(start, open_end),
            close_tag: Span::from_usize(content_end, end),
            content_span,
            lang: script_lang(&attributes),
            context: script_context(&attributes),
            attributes,
        };
        let (slot, label) = match script.context {
            ScriptContext::Module => (&mut self.document.module_script, "module"),
            ScriptContext::Instance => (&mut self.document.instance_script, "instance"),
        };
        if slot.is_some() {
            self.error(ParseErrorKind::DuplicateScript { context: label }, start);
        } else {
            *slot = Some(script);
        }
        None
    }

    // === Attributes ===

    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at_end() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let start = self.pos;

            if self.eat("{") {
                let Some(expression) = self.parse_expression_body(start) else {
                    break;
                };
                let attribute = match expression.text.strip_prefix("...") {
                    Some(_) => expression
                        .slice(3..expression.text.len())
                        .map(Attribute::Spread),
                    None => Some(Attribute::Shorthand(expression)),
                };
                attributes.extend(attribute);
                continue;
            }

            let rest = self.rest();
            let name_len = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\''))
                .unwrap_or(rest.len());
            if name_len == 0 {
                // Stray character such as a lone `/`.
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
                continue;
            }
            let name = &rest[..name_len];
            self.pos += name_len;

            let before_eq = self.pos;
            self.skip_whitespace();
            let value = if self.eat("=") {
                self.skip_whitespace();
                self.parse_attribute_value()
            } else {
                self.pos = before_eq;
                Vec::new()
            };
            let span = Span::from_usize(start, self.pos);

            let directive = name
                .split_once(':')
                .and_then(|(prefix, rest)| Some((DirectiveKind::from_prefix(prefix)?, rest)));
            let attribute = match directive {
                Some((kind, rest)) => {
                    let mut parts = rest.split('|');
                    let name = SmolStr::new(parts.next().unwrap_or_default());
                    let modifiers = parts.map(SmolStr::new).collect();
                    let value = match <[ValuePart; 1]>::try_from(value) {
                        Ok([ValuePart::Expression(expression)]) => Some(expression),
                        _ => None,
                    };
                    Attribute::Directive(Directive {
                        span,
                        kind,
                        name,
                        modifiers,
                        value,
                    })
                }
                None => Attribute::Plain(PlainAttribute {
                    span,
                    name: SmolStr::new(name),
                    value,
                }),
            };
            attributes.push(attribute);
        }
        attributes
    }

    fn parse_attribute_value(&mut self) -> Vec<ValuePart> {
        match self.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                let open = self.pos;
                self.pos += 1;
                let mut parts = Vec::new();
                loop {
                    if self.at_end() {
                        self.error(
                            ParseErrorKind::UnexpectedEof {
                                expected: quote.to_string(),
                            },
                            open,
                        );
                        break;
                    }
                    if self.peek_char() == Some(quote) {
                        self.pos += 1;
                        break;
                    }
                    if self.starts_with("{") {
                        let start = self.pos;
                        self.pos += 1;
                        parts.extend(self.parse_expression_body(start).map(ValuePart::Expression));
                        continue;
                    }
                    parts.push(self.parse_value_text(|c| c == quote || c == '{'));
                }
                parts
            }
            Some('{') => {
                let start = self.pos;
                self.pos += 1;
                self.parse_expression_body(start)
                    .map(ValuePart::Expression)
                    .into_iter()
                    .collect()
            }
            _ => vec![self.parse_value_text(|c| c.is_whitespace() || c == '>')],
        }
    }

    fn parse_value_text(&mut self, stop: impl Fn(char) -> bool) -> ValuePart {
        let start = self.pos;
        let rest = self.rest();
        let len = rest.find(stop).unwrap_or(rest.len());
        self.pos += len;
        ValuePart::Text(Text {
            span: Span::from_usize(start, self.pos),
            data: rest[..len].to_string(),
        })
    }

    // === Blocks ===

    fn parse_block(&mut self) -> Option<Node> {
        let start = self.pos;
        self.pos += 2;
        let keyword = self.read_word();
        let header = self.parse_expression_body(start)?;

        let node = match keyword {
            "if" => {
                let mut block = self.parse_if_body(start, header);
                self.expect_block_close(start, "if");
                block.span = Span::from_usize(start, self.pos);
                Node::If(block)
            }
            "each" => Node::Each(self.parse_each(start, header)),
            "await" => Node::Await(self.parse_await(start, header)),
            "key" => {
                let body = self.parse_children();
                self.expect_block_close(start, "key");
                Node::Key(KeyBlock {
                    span: Span::from_usize(start, self.pos),
                    expression: header,
                    body,
                })
            }
            other => {
                self.error(
                    ParseErrorKind::UnknownBlock {
                        block: other.to_string(),
                    },
                    start,
                );
                return None;
            }
        };
        Some(node)
    }

    /// Consumes `{:keyword rest}`, returning the trimmed `rest`.
    fn parse_continuation(&mut self) -> Option<Expression> {
        let start = self.pos;
        self.pos += 2;
        self.read_word();
        self.parse_expression_body(start)
            .filter(|expression| !expression.is_empty())
    }

    fn expect_block_close(&mut self, start: usize, block: &str) {
        let closes = self
            .rest()
            .strip_prefix("{/")
            .and_then(|r| r.strip_prefix(block))
            .is_some_and(|r| !r.starts_with(is_ident_char));
        if closes {
            self.skip_past('}');
        } else {
            self.error(
                ParseErrorKind::UnclosedBlock {
                    block: block.to_string(),
                },
                start,
            );
        }
    }

    fn parse_if_body(&mut self, start: usize, condition: Expression) -> IfBlock {
        let consequent = self.parse_children();
        let alternate = if self.at_continuation("else") {
            let branch_start = self.pos;
            match self.parse_continuation() {
                Some(rest) => {
                    let condition = lexer::find_keyword(&rest.text, "if")
                        .filter(|kw| kw.start == 0)
                        .and_then(|kw| rest.slice(kw.end..rest.text.len()));
                    match condition {
                        Some(condition) => Some(ElseBranch::If(Box::new(
                            self.parse_if_body(branch_start, condition),
                        ))),
                        None => {
                            self.error(
                                ParseErrorKind::InvalidExpression {
                                    message: format!("expected `if` after else, found `{}`", rest.text),
                                },
                                branch_start,
                            );
                            Some(ElseBranch::Block(self.parse_children()))
                        }
                    }
                }
                None => Some(ElseBranch::Block(self.parse_children())),
            }
        } else {
            None
        };
        IfBlock {
            span: Span::from_usize(start, self.pos),
            condition,
            consequent,
            alternate,
        }
    }

    fn parse_each(&mut self, start: usize, header: Expression) -> EachBlock {
        let (expression, context, index, key) = split_each_header(header);
        let body = self.parse_children();
        let fallback = if self.at_continuation("else") {
            self.parse_continuation();
            Some(self.parse_children())
        } else {
            None
        };
        self.expect_block_close(start, "each");
        EachBlock {
            span: Span::from_usize(start, self.pos),
            expression,
            context,
            index,
            key,
            body,
            fallback,
        }
    }

    fn parse_await(&mut self, start: usize, header: Expression) -> AwaitBlock {
        let text = header.text.as_str();
        let short = ["then", "catch"].into_iter().find_map(|keyword| {
            lexer::find_keyword(text, keyword).map(|range| (keyword, range))
        });

        let (expression, pending, mut then, mut catch) = match short {
            Some((keyword, range)) => {
                let binding = header.slice(range.end..text.len());
                let branch = AwaitBranch {
                    binding,
                    body: self.parse_children(),
                };
                let expression = header.slice(0..range.start).unwrap_or(header.clone());
                if keyword == "then" {
                    (expression, Vec::new(), Some(branch), None)
                } else {
                    (expression, Vec::new(), None, Some(branch))
                }
            }
            None => {
                let pending = self.parse_children();
                (header, pending, None, None)
            }
        };

        loop {
            if self.at_continuation("then") && then.is_none() {
                let binding = self.parse_continuation();
                then = Some(AwaitBranch {
                    binding,
                    body: self.parse_children(),
                });
            } else if self.at_continuation("catch") && catch.is_none() {
                let binding = self.parse_continuation();
                catch = Some(AwaitBranch {
                    binding,
                    body: self.parse_children(),
                });
            } else {
                break;
            }
        }
        self.expect_block_close(start, "await");
        AwaitBlock {
            span: Span::from_usize(start, self.pos),
            expression,
            pending,
            then,
            catch,
        }
    }
}

type EachHeader = (
    Expression,
    Option<Expression>,
    Option<Expression>,
    Option<Expression>,
);

/// Splits `items as item, i (key)` into its parts.
fn split_each_header(header: Expression) -> EachHeader {
    let text = header.text.as_str();
    let Some(as_kw) = lexer::find_keyword(text, "as") else {
        return (header, None, None, None);
    };
    let rest = &text[as_kw.end..];

    let (binding_end, key) = match lexer::trailing_group(rest) {
        Some(group) => (
            as_kw.end + group.start,
            header.slice(as_kw.end + group.start + 1..as_kw.end + group.end - 1),
        ),
        None => (text.len(), None),
    };
    let binding = &text[as_kw.end..binding_end];
    let (context, index) = match lexer::find_comma(binding) {
        Some(comma) => (
            header.slice(as_kw.end..as_kw.end + comma),
            header.slice(as_kw.end + comma + 1..binding_end),
        ),
        None => (header.slice(as_kw.end..binding_end), None),
    };
    let expression = header.slice(0..as_kw.start).unwrap_or_else(|| header.clone());
    (expression, context, index, key)
}

fn script_lang(attributes: &[Attribute]) -> ScriptLang {
    let is_ts = attributes.iter().any(|attr| match attr {
        Attribute::Plain(plain) => {
            let value = plain.static_value().unwrap_or_default();
            (plain.name == "lang" && matches!(value.as_str(), "ts" | "typescript"))
                || (plain.name == "type" && value.contains("typescript"))
        }
        _ => false,
    });
    if is_ts {
        ScriptLang::TypeScript
    } else {
        ScriptLang::JavaScript
    }
}

fn script_context(attributes: &[Attribute]) -> ScriptContext {
    let is_module = attributes.iter().any(|attr| match attr {
        Attribute::Plain(plain) => {
            (plain.name == "context" && plain.static_value().as_deref() == Some("module"))
                || (plain.name == "module" && plain.value.is_empty())
        }
        _ => false,
    });
    if is_module {
        ScriptContext::Module
    } else {
        ScriptContext::Instance
    }
}
