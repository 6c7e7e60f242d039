//! Svelte component to TypeScript transpilation.
//!
//! The generated module wraps the instance script and the template in a
//! `render` function whose return value describes the component's props and
//! slots, then exposes them through a default-exported class:
//!
//! ```text
//! <hoisted instance imports>
//! <module script>;
//! function render() {
//! <instance script, exports unwrapped>;
//! (() => { <template expressions> });
//! return { props: {...}, slots: {...} }}
//!
//! export default class { ... }
//! ```
//!
//! Every script statement and template expression is copied verbatim, so the
//! returned [`SourceMap`] maps checker diagnostics back to the component.

use crate::error::TransformError;
use crate::scanner::{self, ScanMode, ScanResult};
use crate::script::ParsedScript;
use crate::slots::{object_key, Slots};
use crate::template;
use indexmap::IndexMap;
use position_map::{SourceMap, SourceMapBuilder, Span};
use rustc_hash::FxHashSet;
use svelte_markup::Script;
use swc_common::Spanned;
use swc_ecma_ast::{
    AssignOp, AssignTarget, Expr, Ident, LabeledStmt, ModuleDecl, ModuleItem,
    SimpleAssignTarget, Stmt,
};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::debug;

const PROPS_BINDING: &str = "$$props";

/// A transpiled component.
#[derive(Debug, Clone)]
pub struct ComponentOutput {
    code: String,
    source_map: SourceMap,
    props: IndexMap<String, String>,
    slots: Slots,
    uses_props: bool,
}

impl ComponentOutput {
    /// The generated TypeScript module.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Exported prop name to the local binding it exposes.
    pub fn props(&self) -> &IndexMap<String, String> {
        &self.props
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Whether the component reads `$$props`.
    pub fn uses_props(&self) -> bool {
        self.uses_props
    }

    pub fn into_parts(self) -> (String, SourceMap) {
        (self.code, self.source_map)
    }
}

/// A script block parsed on its own, with offsets relative to its content.
struct ScriptBlock<'d> {
    script: &'d Script,
    parsed: ParsedScript,
    base: usize,
}

impl<'d> ScriptBlock<'d> {
    fn parse(source: &str, script: &'d Script, name: &str) -> Result<Self, TransformError> {
        let base = script.content_span.start_usize();
        let parsed = ParsedScript::parse(
            name,
            script.content_span.text(source),
            script.lang.is_typescript(),
        )
        .map_err(|err| TransformError::Script {
            message: err.message,
            offset: (base + err.offset) as u32,
        })?;
        Ok(Self {
            script,
            parsed,
            base,
        })
    }

    fn scan(&self, source: &str, mode: ScanMode) -> Result<ScanResult<'_>, TransformError> {
        scanner::scan(
            &self.parsed,
            self.script.content_span.text(source),
            self.script.lang.is_typescript(),
            mode,
        )
        .map_err(|err| err.into_transform(self.base))
    }

    /// The span of a node in the component source.
    fn span_of(&self, node: &impl Spanned) -> Span {
        let span = node.span();
        Span::from_usize(
            self.base + self.parsed.lo(span),
            self.base + self.parsed.hi(span),
        )
    }

    fn mentions_props(&self) -> bool {
        let mut finder = PropsFinder::default();
        self.parsed.module.visit_with(&mut finder);
        finder.found
    }
}

#[derive(Default)]
struct PropsFinder {
    found: bool,
}

impl Visit for PropsFinder {
    fn visit_ident(&mut self, ident: &Ident) {
        if &*ident.sym == PROPS_BINDING {
            self.found = true;
        }
    }
}

/// Transpiles a Svelte component into a TypeScript module.
pub fn transpile_component(source: &str) -> Result<ComponentOutput, TransformError> {
    let parsed = svelte_markup::parse(source);
    if let Some(err) = parsed.errors.into_iter().next() {
        return Err(err.into());
    }
    let document = parsed.document;

    let module = document
        .module_script
        .as_ref()
        .map(|script| ScriptBlock::parse(source, script, "module.ts"))
        .transpose()?;
    let instance = document
        .instance_script
        .as_ref()
        .map(|script| ScriptBlock::parse(source, script, "instance.ts"))
        .transpose()?;

    let slots = Slots::collect(&document.fragment)?;
    let uses_props = template::mentions_props(&document.fragment)
        || [&module, &instance]
            .into_iter()
            .flatten()
            .any(ScriptBlock::mentions_props);

    let module_scan = module
        .as_ref()
        .map(|block| block.scan(source, ScanMode::Module))
        .transpose()?;
    let instance_scan = instance
        .as_ref()
        .map(|block| block.scan(source, ScanMode::Component))
        .transpose()?;

    let mut out = SourceMapBuilder::new();

    if let Some(block) = &instance {
        for item in &block.parsed.module.body {
            if let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item {
                out.copy(source, block.span_of(import));
                out.push("\n");
            }
        }
    }

    if let Some(block) = &module {
        out.copy(source, block.script.content_span);
        out.replace(block.script.close_tag, ";\n");
    }

    let mut header = String::from("function render() {");
    if uses_props {
        header.push_str("\nlet $$props = __sveltets_allPropsType();");
    }

    let mut props = IndexMap::new();
    match (&instance, &instance_scan) {
        (Some(block), Some(scan)) => {
            out.replace(block.script.open_tag, &header);
            let declared = |name: &str| {
                scan.is_declared(name) || module_scan.as_ref().is_some_and(|m| m.is_declared(name))
            };
            emit_instance(source, block, &declared, &mut out);
            out.replace(block.script.close_tag, ";\n");
            props.extend(
                scan.exports
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.local.clone())),
            );
        }
        _ => {
            header.push('\n');
            out.push(&header);
        }
    }

    template::emit_template(&document.fragment, source, &mut out);

    let props_literal = props
        .iter()
        .map(|(name, local)| {
            if name == local {
                name.clone()
            } else {
                format!("{}: {}", object_key(name), local)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    out.push(&format!(
        "\nreturn {{ props: {{{props_literal}}}, slots: {slots} }}}}"
    ));
    out.push(&format!(
        "\n\nexport default class {{\n    $$prop_def = {}(render().props)\n    $$slot_def = render().slots\n}}\n",
        if uses_props {
            "__sveltets_partial_with_any"
        } else {
            "__sveltets_partial"
        }
    ));

    let (code, source_map) = out.finish();
    debug!(
        props = props.len(),
        slots = slots.len(),
        mappings = source_map.len(),
        "transpiled component"
    );
    Ok(ComponentOutput {
        code,
        source_map,
        props,
        slots,
        uses_props,
    })
}

/// Copies the instance script content, dropping imports (already hoisted),
/// `export` keywords and export clauses, and forward-declaring reactive
/// assignment targets.
fn emit_instance(
    source: &str,
    block: &ScriptBlock<'_>,
    declared: &dyn Fn(&str) -> bool,
    out: &mut SourceMapBuilder,
) {
    let content = block.script.content_span;
    let mut cursor = content.start_usize();
    let mut forward_declared = FxHashSet::default();

    for item in &block.parsed.module.body {
        let span = block.span_of(item);
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(_) | ModuleDecl::ExportNamed(_)) => {
                out.copy(source, Span::from_usize(cursor, span.start_usize()));
                cursor = span.end_usize();
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                out.copy(source, Span::from_usize(cursor, span.start_usize()));
                cursor = block.span_of(&export.decl).start_usize();
            }
            ModuleItem::Stmt(Stmt::Labeled(labeled)) => {
                let Some(target) = reactive_target(labeled) else {
                    continue;
                };
                if declared(target) || !forward_declared.insert(target.to_string()) {
                    continue;
                }
                out.copy(source, Span::from_usize(cursor, span.start_usize()));
                out.push(&format!("let {target};\n"));
                cursor = span.start_usize();
            }
            _ => {}
        }
    }
    out.copy(source, Span::from_usize(cursor, content.end_usize()));
}

/// The assigned identifier of a `$: name = ...` statement.
fn reactive_target(stmt: &LabeledStmt) -> Option<&str> {
    if &*stmt.label.sym != "$" {
        return None;
    }
    let Stmt::Expr(expr_stmt) = &*stmt.body else {
        return None;
    };
    let Expr::Assign(assign) = &*expr_stmt.expr else {
        return None;
    };
    if assign.op != AssignOp::Assign {
        return None;
    }
    match &assign.left {
        AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => Some(&*binding.id.sym),
        _ => None,
    }
}
