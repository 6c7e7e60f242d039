//! Emission of template expressions as checkable TypeScript.
//!
//! Every markup expression is copied verbatim into a statement so that the
//! type checker sees it in the scope of the component's render function.
//! Control-flow blocks become the matching JavaScript statements; text,
//! comments and styling carry no types and are skipped.

use position_map::{Span, SourceMapBuilder};
use svelte_markup::lexer;
use svelte_markup::{
    AwaitBlock, Attribute, Directive, DirectiveKind, EachBlock, Element, ElseBranch, Expression,
    IfBlock, Node, SpecialTag, TagKind, ValuePart,
};

/// Emits `nodes` as the body of an immediately-invoked template arrow.
pub(crate) fn emit_template(nodes: &[Node], source: &str, out: &mut SourceMapBuilder) {
    let mut emitter = TemplateEmitter { source, out };
    emitter.out.push("(() => {\n");
    emitter.nodes(nodes);
    emitter.out.push("});\n");
}

struct TemplateEmitter<'a> {
    source: &'a str,
    out: &'a mut SourceMapBuilder,
}

impl TemplateEmitter<'_> {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Element(el) => self.element(el),
            Node::Mustache(mustache) => self.statement(&mustache.expression),
            Node::Tag(tag) => self.special_tag(tag),
            Node::If(block) => {
                self.if_block(block);
                self.out.push("\n");
            }
            Node::Each(block) => self.each_block(block),
            Node::Await(block) => self.await_block(block),
            Node::Key(block) => {
                self.statement(&block.expression);
                self.nodes(&block.body);
            }
            Node::Text(_) | Node::Comment(_) => {}
        }
    }

    fn copy(&mut self, span: Span) {
        self.out.copy(self.source, span);
    }

    /// `(expr);`
    fn statement(&mut self, expr: &Expression) {
        self.out.push("(");
        self.copy(expr.span);
        self.out.push(");\n");
    }

    fn element(&mut self, el: &Element) {
        for attr in &el.attributes {
            match attr {
                Attribute::Plain(plain) => {
                    for part in &plain.value {
                        if let ValuePart::Expression(expr) = part {
                            self.statement(expr);
                        }
                    }
                }
                Attribute::Shorthand(expr) => self.statement(expr),
                Attribute::Spread(expr) => {
                    self.out.push("({...");
                    self.copy(expr.span);
                    self.out.push("});\n");
                }
                Attribute::Directive(directive) => self.directive(directive),
            }
        }

        // `let:` bindings scope over the element's children.
        let lets: Vec<&Directive> = el
            .attributes
            .iter()
            .filter_map(|attr| match attr {
                Attribute::Directive(d) if d.kind == DirectiveKind::Let => Some(d),
                _ => None,
            })
            .collect();
        if lets.is_empty() {
            self.nodes(&el.children);
            return;
        }
        self.out.push("{\n");
        for directive in lets {
            self.out.push("let ");
            match &directive.value {
                Some(pattern) => self.copy(pattern.span),
                None => self.copy(self.directive_name_span(directive)),
            }
            self.out.push(" = __sveltets_any;\n");
        }
        self.nodes(&el.children);
        self.out.push("}\n");
    }

    fn directive(&mut self, directive: &Directive) {
        match directive.kind {
            DirectiveKind::Let => {}
            DirectiveKind::On => {
                if let Some(value) = &directive.value {
                    self.statement(value);
                }
            }
            // `bind:value`, `class:active` and `style:color` without a value
            // refer to a variable of the same name.
            DirectiveKind::Bind | DirectiveKind::Class | DirectiveKind::Style => {
                match &directive.value {
                    Some(value) => self.statement(value),
                    None => self.name_statement(directive),
                }
            }
            DirectiveKind::Use
            | DirectiveKind::Transition
            | DirectiveKind::In
            | DirectiveKind::Out
            | DirectiveKind::Animate => {
                self.name_statement(directive);
                if let Some(value) = &directive.value {
                    self.statement(value);
                }
            }
        }
    }

    /// Where the directive name sits, between the `prefix:` and any
    /// `|modifier`s.
    fn directive_name_span(&self, directive: &Directive) -> Span {
        let text = directive.span.text(self.source);
        let start = directive.span.start_usize() + text.find(':').map_or(0, |idx| idx + 1);
        Span::from_usize(start, start + directive.name.len())
    }

    fn name_statement(&mut self, directive: &Directive) {
        if directive.name.is_empty() {
            return;
        }
        self.out.push("(");
        self.copy(self.directive_name_span(directive));
        self.out.push(");\n");
    }

    fn special_tag(&mut self, tag: &SpecialTag) {
        let Some(expr) = &tag.expression else {
            return;
        };
        match tag.kind {
            TagKind::Html | TagKind::Debug => self.statement(expr),
            TagKind::Const => {
                self.out.push("const ");
                self.copy(expr.span);
                self.out.push(";\n");
            }
        }
    }

    /// Emits the `if` chain without a trailing newline.
    fn if_block(&mut self, block: &IfBlock) {
        self.out.push("if (");
        self.copy(block.condition.span);
        self.out.push(") {\n");
        self.nodes(&block.consequent);
        self.out.push("}");
        match &block.alternate {
            Some(ElseBranch::Block(nodes)) => {
                self.out.push(" else {\n");
                self.nodes(nodes);
                self.out.push("}");
            }
            Some(ElseBranch::If(inner)) => {
                self.out.push(" else ");
                self.if_block(inner);
            }
            None => {}
        }
    }

    fn each_block(&mut self, block: &EachBlock) {
        self.out.push("for (const ");
        match &block.context {
            Some(context) => self.copy(context.span),
            None => self.out.push("__sveltets_item"),
        }
        self.out.push(" of __sveltets_each(");
        self.copy(block.expression.span);
        self.out.push(")) {\n");
        if let Some(index) = &block.index {
            self.out.push("let ");
            self.copy(index.span);
            self.out.push(" = 0;\n");
        }
        if let Some(key) = &block.key {
            self.statement(key);
        }
        self.nodes(&block.body);
        self.out.push("}\n");

        if let Some(fallback) = &block.fallback {
            self.out.push("{\n");
            self.nodes(fallback);
            self.out.push("}\n");
        }
    }

    fn await_block(&mut self, block: &AwaitBlock) {
        self.statement(&block.expression);
        self.nodes(&block.pending);

        if let Some(then) = &block.then {
            self.out.push("{\n");
            if let Some(binding) = &then.binding {
                self.out.push("const ");
                self.copy(binding.span);
                self.out.push(" = __sveltets_awaited(");
                self.copy(block.expression.span);
                self.out.push(");\n");
            }
            self.nodes(&then.body);
            self.out.push("}\n");
        }
        if let Some(catch) = &block.catch {
            self.out.push("{\n");
            if let Some(binding) = &catch.binding {
                self.out.push("const ");
                self.copy(binding.span);
                self.out.push(" = __sveltets_any;\n");
            }
            self.nodes(&catch.body);
            self.out.push("}\n");
        }
    }
}

fn visit_if(block: &IfBlock, f: &mut impl FnMut(&Expression)) {
    f(&block.condition);
    visit_expressions(&block.consequent, f);
    match &block.alternate {
        Some(ElseBranch::Block(nodes)) => visit_expressions(nodes, f),
        Some(ElseBranch::If(inner)) => visit_if(inner, f),
        None => {}
    }
}

/// True when any template expression refers to `$$props`.
pub(crate) fn mentions_props(nodes: &[Node]) -> bool {
    let mut found = false;
    visit_expressions(nodes, &mut |expr| {
        found = found || lexer::identifiers(&expr.text).any(|ident| ident == "$$props");
    });
    found
}

fn visit_expressions(nodes: &[Node], f: &mut impl FnMut(&Expression)) {
    for node in nodes {
        match node {
            Node::Element(el) => {
                for attr in &el.attributes {
                    match attr {
                        Attribute::Plain(plain) => {
                            for part in &plain.value {
                                if let ValuePart::Expression(expr) = part {
                                    f(expr);
                                }
                            }
                        }
                        Attribute::Shorthand(expr) | Attribute::Spread(expr) => f(expr),
                        Attribute::Directive(directive) => {
                            if let Some(value) = &directive.value {
                                f(value);
                            }
                        }
                    }
                }
                visit_expressions(&el.children, f);
            }
            Node::Mustache(mustache) => f(&mustache.expression),
            Node::Tag(tag) => {
                if let Some(expr) = &tag.expression {
                    f(expr);
                }
            }
            Node::If(block) => visit_if(block, f),
            Node::Each(block) => {
                f(&block.expression);
                for expr in [&block.context, &block.index, &block.key].into_iter().flatten() {
                    f(expr);
                }
                visit_expressions(&block.body, f);
                if let Some(fallback) = &block.fallback {
                    visit_expressions(fallback, f);
                }
            }
            Node::Await(block) => {
                f(&block.expression);
                visit_expressions(&block.pending, f);
                for branch in [&block.then, &block.catch].into_iter().flatten() {
                    visit_expressions(&branch.body, f);
                }
            }
            Node::Key(block) => {
                f(&block.expression);
                visit_expressions(&block.body, f);
            }
            Node::Text(_) | Node::Comment(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn emit(source: &str) -> String {
        let parsed = svelte_markup::parse(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let mut out = SourceMapBuilder::new();
        emit_template(&parsed.document.fragment, source, &mut out);
        out.finish().0
    }

    #[test]
    fn test_mustaches_and_attributes() {
        assert_eq!(
            emit(r#"<p class="a {b}" {title} {...rest}>{count + 1}</p>"#),
            "(() => {\n(b);\n(title);\n({...rest});\n(count + 1);\n});\n"
        );
    }

    #[test]
    fn test_directives() {
        assert_eq!(
            emit(r#"<input bind:value on:input={handle} on:blur class:active use:tooltip={opts} transition:fade />"#),
            "(() => {\n(value);\n(handle);\n(active);\n(tooltip);\n(opts);\n(fade);\n});\n"
        );
    }

    #[test]
    fn test_if_chain() {
        assert_eq!(
            emit("{#if a}{x}{:else if b}{y}{:else}{z}{/if}"),
            "(() => {\nif (a) {\n(x);\n} else if (b) {\n(y);\n} else {\n(z);\n}\n});\n"
        );
    }

    #[test]
    fn test_each_with_index_key_and_fallback() {
        assert_eq!(
            emit("{#each items as item, i (item.id)}{item.name}{:else}{empty}{/each}"),
            "(() => {\nfor (const item of __sveltets_each(items)) {\nlet i = 0;\n(item.id);\n(item.name);\n}\n{\n(empty);\n}\n});\n"
        );
    }

    #[test]
    fn test_await_branches() {
        assert_eq!(
            emit("{#await promise}{loading}{:then value}{value}{:catch error}{error.message}{/await}"),
            "(() => {\n(promise);\n(loading);\n{\nconst value = __sveltets_awaited(promise);\n(value);\n}\n{\nconst error = __sveltets_any;\n(error.message);\n}\n});\n"
        );
    }

    #[test]
    fn test_let_directive_scopes_children() {
        assert_eq!(
            emit("<List let:item let:index={i}>{item}{i}</List>"),
            "(() => {\n{\nlet item = __sveltets_any;\nlet i = __sveltets_any;\n(item);\n(i);\n}\n});\n"
        );
    }

    #[test]
    fn test_special_tags_and_key() {
        assert_eq!(
            emit("{#key id}{@html raw}{@const doubled = n * 2}{/key}<!-- note -->text"),
            "(() => {\n(id);\n(raw);\nconst doubled = n * 2;\n});\n"
        );
    }

    #[test]
    fn test_expressions_map_back_to_markup() {
        let source = "<h1>{greeting}</h1>";
        let parsed = svelte_markup::parse(source);
        let mut out = SourceMapBuilder::new();
        emit_template(&parsed.document.fragment, source, &mut out);
        let (code, map) = out.finish();
        let generated = code.find("greeting").unwrap() as u32;
        assert_eq!(
            map.original_position(generated.into()),
            Some((source.find("greeting").unwrap() as u32).into())
        );
    }

    #[test]
    fn test_mentions_props() {
        let uses = |source: &str| mentions_props(&svelte_markup::parse(source).document.fragment);
        assert!(uses("<p>{$$props.title}</p>"));
        assert!(uses("{#if ok}<b {...$$props} />{/if}"));
        assert!(!uses("<p>{props.title} $$props</p>"));
    }
}
