//! Slot descriptors collected from `<slot>` elements.

use crate::error::TransformError;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;
use svelte_markup::{Attribute, Element, ElementKind, ElseBranch, Node, PlainAttribute, ValuePart};

/// Exposed property name to target expression text.
pub type SlotProps = IndexMap<SmolStr, String>;

/// Every slot a component renders, keyed by slot name (`default` for the
/// unnamed slot), in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    slots: IndexMap<SmolStr, SlotProps>,
}

impl Slots {
    pub fn get(&self, name: &str) -> Option<&SlotProps> {
        self.slots.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &SlotProps)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Collects the slots declared anywhere in `nodes`.
    ///
    /// A slot rendered more than once keeps the props of its last occurrence.
    pub fn collect(nodes: &[Node]) -> Result<Self, TransformError> {
        let mut slots = Slots::default();
        slots.visit(nodes)?;
        Ok(slots)
    }

    fn visit(&mut self, nodes: &[Node]) -> Result<(), TransformError> {
        for node in nodes {
            match node {
                Node::Element(el) => {
                    if el.kind == ElementKind::Slot {
                        let (name, props) = slot_descriptor(el)?;
                        self.slots.insert(name, props);
                    }
                    self.visit(&el.children)?;
                }
                Node::If(block) => {
                    self.visit(&block.consequent)?;
                    let mut alternate = block.alternate.as_ref();
                    while let Some(branch) = alternate {
                        match branch {
                            ElseBranch::Block(nodes) => {
                                self.visit(nodes)?;
                                alternate = None;
                            }
                            ElseBranch::If(inner) => {
                                self.visit(&inner.consequent)?;
                                alternate = inner.alternate.as_ref();
                            }
                        }
                    }
                }
                Node::Each(block) => {
                    self.visit(&block.body)?;
                    if let Some(fallback) = &block.fallback {
                        self.visit(fallback)?;
                    }
                }
                Node::Await(block) => {
                    self.visit(&block.pending)?;
                    for branch in [&block.then, &block.catch].into_iter().flatten() {
                        self.visit(&branch.body)?;
                    }
                }
                Node::Key(block) => self.visit(&block.body)?,
                Node::Text(_) | Node::Comment(_) | Node::Mustache(_) | Node::Tag(_) => {}
            }
        }
        Ok(())
    }
}

fn structural(message: &str, offset: impl Into<u32>) -> TransformError {
    TransformError::Structural {
        message: message.to_string(),
        offset: offset.into(),
    }
}

fn slot_descriptor(el: &Element) -> Result<(SmolStr, SlotProps), TransformError> {
    let mut name = SmolStr::new_static("default");
    let mut props = SlotProps::new();
    for attr in &el.attributes {
        match attr {
            Attribute::Plain(plain) if plain.name == "name" => match plain.static_value() {
                Some(value) => name = value.into(),
                None => return Err(structural("slot names must be static", plain.span.start)),
            },
            Attribute::Plain(plain) => {
                props.insert(plain.name.clone(), attribute_value(plain));
            }
            Attribute::Shorthand(expr) => {
                props.insert(SmolStr::new(&expr.text), expr.text.clone());
            }
            Attribute::Spread(expr) => {
                return Err(structural(
                    "spread attributes on <slot> are not supported",
                    expr.span.start,
                ));
            }
            Attribute::Directive(_) => {}
        }
    }
    Ok((name, props))
}

/// Renders an attribute value as a JavaScript expression.
fn attribute_value(attr: &PlainAttribute) -> String {
    match attr.value.as_slice() {
        [] => "true".to_string(),
        [ValuePart::Expression(expr)] => expr.text.clone(),
        parts => match attr.static_value() {
            Some(text) => quote_string(&text),
            None => template_literal(parts),
        },
    }
}

fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn template_literal(parts: &[ValuePart]) -> String {
    let mut out = String::from("`");
    for part in parts {
        match part {
            ValuePart::Text(text) => {
                out.push_str(
                    &text
                        .data
                        .replace('\\', "\\\\")
                        .replace('`', "\\`")
                        .replace("${", "\\${"),
                );
            }
            ValuePart::Expression(expr) => {
                out.push_str("${");
                out.push_str(&expr.text);
                out.push('}');
            }
        }
    }
    out.push('`');
    out
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// An object literal key, quoted unless it is a plain identifier.
pub(crate) fn object_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote_string(name)
    }
}

/// Serializes as `{name: {prop:expr, ...}, ...}`.
impl fmt::Display for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, props)) in self.slots.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {{", object_key(name))?;
            for (prop_idx, (prop, expr)) in props.iter().enumerate() {
                if prop_idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}:{}", object_key(prop), expr)?;
            }
            f.write_str("}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slots_of(source: &str) -> Result<Slots, TransformError> {
        let parsed = svelte_markup::parse(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        Slots::collect(&parsed.document.fragment)
    }

    #[test]
    fn test_default_slot_with_literal_prop() {
        let slots = slots_of(r#"<div><slot bar="baz" /></div>"#).unwrap();
        assert_eq!(slots.to_string(), r#"{default: {bar:"baz"}}"#);
    }

    #[test]
    fn test_prop_value_forms() {
        let slots = slots_of(
            r#"<slot name="row" item={items[i]} {index} label="a{b}`c" open data-id="x&quot;y" />"#,
        )
        .unwrap();
        let row = slots.get("row").unwrap();
        assert_eq!(row["item"], "items[i]");
        assert_eq!(row["index"], "index");
        assert_eq!(row["label"], "`a${b}\\`c`");
        assert_eq!(row["open"], "true");
        assert_eq!(
            slots.to_string(),
            r#"{row: {item:items[i], index:index, label:`a${b}\`c`, open:true, "data-id":"x&quot;y"}}"#
        );
    }

    #[test]
    fn test_escaping_in_string_values() {
        let slots = slots_of(r#"<slot title='say "hi" \o/' />"#).unwrap();
        assert_eq!(slots.get("default").unwrap()["title"], r#""say \"hi\" \\o/""#);
    }

    #[test]
    fn test_slots_inside_blocks_in_order() {
        let slots = slots_of(
            "{#if a}<slot name=\"header\" />{:else}<slot />{/if}{#each xs as x}<slot name=\"item\" {x} />{/each}",
        )
        .unwrap();
        let names: Vec<_> = slots.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["header", "default", "item"]);
        assert_eq!(slots.to_string(), "{header: {}, default: {}, item: {x:x}}");
    }

    #[test]
    fn test_quoted_slot_name_key() {
        let slots = slots_of(r#"<slot name="side-bar" />"#).unwrap();
        assert_eq!(slots.to_string(), r#"{"side-bar": {}}"#);
    }

    #[test]
    fn test_spread_and_dynamic_name_are_errors() {
        assert!(matches!(
            slots_of("<slot {...props} />"),
            Err(TransformError::Structural { offset: 10, .. })
        ));
        assert!(matches!(
            slots_of("<slot name={n} />"),
            Err(TransformError::Structural { .. })
        ));
    }

    #[test]
    fn test_no_slots() {
        let slots = slots_of("<p>plain</p>").unwrap();
        assert!(slots.is_empty());
        assert_eq!(slots.to_string(), "{}");
    }
}
