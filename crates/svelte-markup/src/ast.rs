//! Node tree for Svelte components.
//!
//! Every node keeps the byte span it was parsed from so the transpiler can
//! copy expressions verbatim and map them back to the component source.

use position_map::Span;
use smol_str::SmolStr;
use std::ops::Range;

/// A parsed component.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// `<script context="module">` or `<script module>`.
    pub module_script: Option<Script>,
    /// The instance `<script>`.
    pub instance_script: Option<Script>,
    /// Top-level `<style>` blocks.
    pub styles: Vec<Style>,
    /// Template nodes, excluding top-level script and style blocks.
    pub fragment: Vec<Node>,
    pub span: Span,
}

/// A top-level script block.
#[derive(Debug, Clone)]
pub struct Script {
    /// The whole block including both tags.
    pub span: Span,
    /// The opening `<script ...>` tag.
    pub open_tag: Span,
    /// The closing `</script>` tag.
    pub close_tag: Span,
    /// The text between the tags.
    pub content_span: Span,
    pub lang: ScriptLang,
    pub context: ScriptContext,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptLang {
    #[default]
    JavaScript,
    TypeScript,
}

impl ScriptLang {
    #[inline]
    pub fn is_typescript(self) -> bool {
        self == ScriptLang::TypeScript
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptContext {
    #[default]
    Instance,
    Module,
}

/// A top-level style block. Only its extent matters.
#[derive(Debug, Clone)]
pub struct Style {
    pub span: Span,
    pub content_span: Span,
}

/// A template node.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
    /// `{expression}`
    Mustache(Mustache),
    /// `{@html ...}`, `{@debug ...}` or `{@const ...}`.
    Tag(SpecialTag),
    If(IfBlock),
    Each(EachBlock),
    Await(AwaitBlock),
    Key(KeyBlock),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Element(n) => n.span,
            Node::Text(n) => n.span,
            Node::Comment(n) => n.span,
            Node::Mustache(n) => n.span,
            Node::Tag(n) => n.span,
            Node::If(n) => n.span,
            Node::Each(n) => n.span,
            Node::Await(n) => n.span,
            Node::Key(n) => n.span,
        }
    }
}

/// A JavaScript expression embedded in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Span of the trimmed expression text.
    pub span: Span,
    pub text: String,
}

impl Expression {
    /// Builds an expression from `source[start..end]`, trimming whitespace.
    pub fn trimmed(source: &str, start: usize, end: usize) -> Self {
        let raw = &source[start..end];
        let lead = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        Self {
            span: Span::from_usize(start + lead, start + lead + text.len()),
            text: text.to_string(),
        }
    }

    /// The trimmed sub-expression covering `range` of this expression's text,
    /// or `None` when it is blank.
    pub fn slice(&self, range: Range<usize>) -> Option<Expression> {
        let base = self.span.start_usize();
        let sub = Expression::trimmed(&self.text, range.start, range.end);
        if sub.text.is_empty() {
            return None;
        }
        Some(Expression {
            span: Span::from_usize(base + sub.span.start_usize(), base + sub.span.end_usize()),
            text: sub.text,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// How an element name is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A regular HTML element.
    Html,
    /// A capitalized or dotted component reference.
    Component,
    /// `<slot>`.
    Slot,
    /// `<svelte:*>`.
    Special,
}

impl ElementKind {
    pub fn from_name(name: &str) -> Self {
        if name == "slot" {
            ElementKind::Slot
        } else if name.starts_with("svelte:") {
            ElementKind::Special
        } else if name.contains('.') || name.starts_with(|c: char| c.is_ascii_uppercase()) {
            ElementKind::Component
        } else {
            ElementKind::Html
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub span: Span,
    pub name: SmolStr,
    pub kind: ElementKind,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

impl Element {
    /// Finds a plain attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&PlainAttribute> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::Plain(plain) if plain.name == name => Some(plain),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Text {
    pub span: Span,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub span: Span,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct Mustache {
    pub span: Span,
    pub expression: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Html,
    Debug,
    Const,
}

#[derive(Debug, Clone)]
pub struct SpecialTag {
    pub span: Span,
    pub kind: TagKind,
    /// The tag body; `None` for a bare `{@debug}`.
    pub expression: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct IfBlock {
    pub span: Span,
    pub condition: Expression,
    pub consequent: Vec<Node>,
    pub alternate: Option<ElseBranch>,
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    /// `{:else}`
    Block(Vec<Node>),
    /// `{:else if ...}`
    If(Box<IfBlock>),
}

#[derive(Debug, Clone)]
pub struct EachBlock {
    pub span: Span,
    pub expression: Expression,
    /// The item binding pattern after `as`.
    pub context: Option<Expression>,
    pub index: Option<Expression>,
    pub key: Option<Expression>,
    pub body: Vec<Node>,
    pub fallback: Option<Vec<Node>>,
}

#[derive(Debug, Clone)]
pub struct AwaitBlock {
    pub span: Span,
    pub expression: Expression,
    pub pending: Vec<Node>,
    pub then: Option<AwaitBranch>,
    pub catch: Option<AwaitBranch>,
}

#[derive(Debug, Clone, Default)]
pub struct AwaitBranch {
    pub binding: Option<Expression>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct KeyBlock {
    pub span: Span,
    pub expression: Expression,
    pub body: Vec<Node>,
}

/// An attribute on an element or script tag.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// `name`, `name="text {expr}"` or `name={expr}`.
    Plain(PlainAttribute),
    /// `{name}`
    Shorthand(Expression),
    /// `{...props}`
    Spread(Expression),
    /// `kind:name|modifiers={expr}`
    Directive(Directive),
}

#[derive(Debug, Clone)]
pub struct PlainAttribute {
    pub span: Span,
    pub name: SmolStr,
    /// Empty for a valueless attribute.
    pub value: Vec<ValuePart>,
}

impl PlainAttribute {
    /// The literal value when the attribute has no expressions.
    pub fn static_value(&self) -> Option<String> {
        self.value
            .iter()
            .map(|part| match part {
                ValuePart::Text(text) => Some(text.data.as_str()),
                ValuePart::Expression(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ValuePart {
    Text(Text),
    Expression(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    On,
    Bind,
    Class,
    Style,
    Use,
    Transition,
    In,
    Out,
    Animate,
    Let,
}

impl DirectiveKind {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "on" => DirectiveKind::On,
            "bind" => DirectiveKind::Bind,
            "class" => DirectiveKind::Class,
            "style" => DirectiveKind::Style,
            "use" => DirectiveKind::Use,
            "transition" => DirectiveKind::Transition,
            "in" => DirectiveKind::In,
            "out" => DirectiveKind::Out,
            "animate" => DirectiveKind::Animate,
            "let" => DirectiveKind::Let,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub span: Span,
    pub kind: DirectiveKind,
    pub name: SmolStr,
    pub modifiers: Vec<SmolStr>,
    pub value: Option<Expression>,
}
