//! Classification of the top-level bindings of a script.
//!
//! The scanner only looks at top-level statements. Exports are described by
//! borrowed references into the swc tree, so a [`ScanResult`] cannot outlive
//! the [`ParsedScript`] it was computed from.

use crate::error::ScanError;
use crate::script::ParsedScript;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use swc_common::Spanned;
use swc_ecma_ast::{
    ArrowExpr, BindingIdent, BlockStmtOrExpr, Decl, ExportSpecifier, Expr, Function,
    ImportSpecifier, ModuleDecl, ModuleExportName, ModuleItem, ObjectPatProp, Pat, Stmt,
    TsTypeAnn, VarDeclarator,
};
use tracing::debug;

/// What the scanned script is, which decides how strict the scan is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// A component instance script. Re-exports and default exports have no
    /// meaning there and are rejected.
    Component,
    /// A standalone module. Exports without an annotatable node are skipped.
    Module,
}

impl ScanMode {
    fn reject(self, message: &str, offset: usize) -> Result<(), ScanError> {
        match self {
            ScanMode::Component => Err(ScanError::new(message, offset)),
            ScanMode::Module => {
                debug!(offset, "skipping export: {message}");
                Ok(())
            }
        }
    }
}

/// A function-valued export.
#[derive(Debug, Clone)]
pub struct FunctionShape<'m> {
    pub params: Vec<&'m Pat>,
    pub return_type: Option<&'m TsTypeAnn>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    /// An arrow function whose single parameter has no parentheses.
    pub bare_param: bool,
    /// Offset of the `)` closing the parameter list.
    pub params_close: Option<usize>,
    /// Offset where the body starts.
    pub body_start: usize,
}

/// A value export that is not a function.
#[derive(Debug, Clone, Default)]
pub struct VariableShape<'m> {
    pub declarator: Option<&'m VarDeclarator>,
    /// The binding when it is a plain identifier.
    pub binding: Option<&'m BindingIdent>,
}

impl VariableShape<'_> {
    pub fn has_initializer(&self) -> bool {
        self.declarator.is_some_and(|d| d.init.is_some())
    }
}

#[derive(Debug, Clone)]
pub enum ExportKind<'m> {
    Function(FunctionShape<'m>),
    Variable(VariableShape<'m>),
}

/// One exported binding.
#[derive(Debug, Clone)]
pub struct ExportEntry<'m> {
    /// The local name the export refers to.
    pub local: String,
    pub kind: ExportKind<'m>,
    pub has_explicit_type: bool,
    /// False for an export clause naming a local with no top-level
    /// declaration.
    pub is_bound: bool,
}

impl<'m> ExportEntry<'m> {
    fn plain(local: String) -> Self {
        Self {
            local,
            kind: ExportKind::Variable(VariableShape::default()),
            has_explicit_type: false,
            is_bound: false,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionShape<'m>> {
        match &self.kind {
            ExportKind::Function(shape) => Some(shape),
            ExportKind::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableShape<'m>> {
        match &self.kind {
            ExportKind::Variable(shape) => Some(shape),
            ExportKind::Function(_) => None,
        }
    }
}

/// Exports keyed by exported name, in source order, plus the names of every
/// non-exported top-level declaration.
#[derive(Debug, Default)]
pub struct ScanResult<'m> {
    pub exports: IndexMap<String, ExportEntry<'m>>,
    pub declared: FxHashSet<String>,
}

impl ScanResult<'_> {
    /// True when `name` is bound at the top level, exported or not.
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
            || self
                .exports
                .values()
                .any(|entry| entry.is_bound && entry.local == name)
    }
}

/// A top-level binding before it is known whether it is exported.
#[derive(Debug, Clone, Copy)]
enum Binding<'m> {
    Function(&'m Function),
    Declarator(&'m VarDeclarator),
    Pattern { typed: bool },
    Other,
}

/// Scans the top-level statements of `script`.
///
/// `source` must be the text the script was parsed from. `typed` selects how
/// explicit types are recognized: annotations in TypeScript, JSDoc tags in
/// JavaScript.
pub fn scan<'m>(
    script: &'m ParsedScript,
    source: &str,
    typed: bool,
    mode: ScanMode,
) -> Result<ScanResult<'m>, ScanError> {
    Scanner {
        script,
        source,
        typed,
    }
    .run(mode)
}

struct Scanner<'m, 's> {
    script: &'m ParsedScript,
    source: &'s str,
    typed: bool,
}

impl<'m> Scanner<'m, '_> {
    fn run(&self, mode: ScanMode) -> Result<ScanResult<'m>, ScanError> {
        let body = &self.script.module.body;

        let mut locals: FxHashMap<String, (Binding<'m>, usize)> = FxHashMap::default();
        for item in body {
            let decl = match item {
                ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &export.decl,
                _ => continue,
            };
            let item_lo = self.script.lo(item.span());
            for (name, binding) in bindings(decl) {
                locals.entry(name).or_insert((binding, item_lo));
            }
        }

        let mut result = ScanResult::default();
        for item in body {
            let item_lo = self.script.lo(item.span());
            match item {
                ModuleItem::Stmt(Stmt::Decl(decl)) => {
                    result
                        .declared
                        .extend(bindings(decl).into_iter().map(|(name, _)| name));
                }
                ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                    result
                        .declared
                        .extend(import.specifiers.iter().map(|spec| match spec {
                            ImportSpecifier::Named(s) => s.local.sym.to_string(),
                            ImportSpecifier::Default(s) => s.local.sym.to_string(),
                            ImportSpecifier::Namespace(s) => s.local.sym.to_string(),
                        }));
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                    for (name, binding) in bindings(&export.decl) {
                        let entry = self.entry(name.clone(), binding, item_lo);
                        result.exports.insert(name, entry);
                    }
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => {
                    if named.type_only {
                        continue;
                    }
                    if named.src.is_some() {
                        mode.reject("re-exports from another module are not supported", item_lo)?;
                        continue;
                    }
                    for spec in &named.specifiers {
                        let ExportSpecifier::Named(spec) = spec else {
                            mode.reject("unsupported export specifier", item_lo)?;
                            continue;
                        };
                        if spec.is_type_only {
                            continue;
                        }
                        let local = match &spec.orig {
                            ModuleExportName::Ident(ident) => ident.sym.to_string(),
                            ModuleExportName::Str(s) => {
                                return Err(ScanError::new(
                                    "string literal export names need a source module",
                                    self.script.lo(s.span),
                                ));
                            }
                        };
                        let exported = match &spec.exported {
                            Some(ModuleExportName::Ident(ident)) => ident.sym.to_string(),
                            Some(ModuleExportName::Str(s)) => self.string_contents(s.span),
                            None => local.clone(),
                        };
                        let entry = match locals.get(&local) {
                            Some(&(binding, lo)) => self.entry(local, binding, lo),
                            None => ExportEntry::plain(local),
                        };
                        result.exports.insert(exported, entry);
                    }
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportAll(_)) => {
                    mode.reject("`export *` is not supported", item_lo)?;
                }
                ModuleItem::ModuleDecl(
                    ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_),
                ) => {
                    mode.reject("default exports are not supported", item_lo)?;
                }
                _ => {}
            }
        }
        Ok(result)
    }

    fn entry(&self, local: String, binding: Binding<'m>, stmt_lo: usize) -> ExportEntry<'m> {
        let (kind, annotated) = match binding {
            Binding::Function(func) => {
                let shape = self.function_shape(func);
                let annotated = function_annotated(&shape);
                (ExportKind::Function(shape), annotated)
            }
            Binding::Declarator(declarator) => {
                let binding_typed = pat_has_type_ann(&declarator.name);
                match declarator.init.as_deref().map(unparen) {
                    Some(Expr::Arrow(arrow)) => {
                        let shape = self.arrow_shape(arrow);
                        let annotated = binding_typed || function_annotated(&shape);
                        (ExportKind::Function(shape), annotated)
                    }
                    Some(Expr::Fn(func)) => {
                        let shape = self.function_shape(&func.function);
                        let annotated = binding_typed || function_annotated(&shape);
                        (ExportKind::Function(shape), annotated)
                    }
                    init => {
                        let asserted = matches!(
                            init,
                            Some(Expr::TsSatisfies(_) | Expr::TsAs(_) | Expr::TsConstAssertion(_))
                        );
                        let binding = match &declarator.name {
                            Pat::Ident(ident) => Some(ident),
                            _ => None,
                        };
                        let shape = VariableShape {
                            declarator: Some(declarator),
                            binding,
                        };
                        (ExportKind::Variable(shape), binding_typed || asserted)
                    }
                }
            }
            Binding::Pattern { typed } => (ExportKind::Variable(VariableShape::default()), typed),
            Binding::Other => (ExportKind::Variable(VariableShape::default()), false),
        };

        let documented = !self.typed && has_jsdoc_type(self.source, stmt_lo);
        ExportEntry {
            local,
            kind,
            has_explicit_type: annotated || documented,
            is_bound: true,
        }
    }

    fn function_shape(&self, func: &'m Function) -> FunctionShape<'m> {
        let params: Vec<&Pat> = func.params.iter().map(|param| &param.pat).collect();
        let fn_lo = self.script.lo(func.span);
        let body_start = match &func.body {
            Some(body) => self.script.lo(body.span),
            None => self.script.hi(func.span),
        };
        FunctionShape {
            params_close: self.params_close(&params, fn_lo, body_start),
            params,
            return_type: func.return_type.as_deref(),
            is_async: func.is_async,
            is_generator: func.is_generator,
            is_arrow: false,
            bare_param: false,
            body_start,
        }
    }

    fn arrow_shape(&self, arrow: &'m ArrowExpr) -> FunctionShape<'m> {
        let params: Vec<&Pat> = arrow.params.iter().collect();
        let arrow_lo = self.script.lo(arrow.span);
        let body_start = match arrow.body.as_ref() {
            BlockStmtOrExpr::BlockStmt(block) => self.script.lo(block.span),
            BlockStmtOrExpr::Expr(expr) => self.script.lo(expr.span()),
        };
        let bare_param = match params.as_slice() {
            [param] => self
                .source
                .get(arrow_lo..self.script.lo(param.span()))
                .is_some_and(|prefix| !prefix.contains('(')),
            _ => false,
        };
        FunctionShape {
            params_close: if bare_param {
                None
            } else {
                self.params_close(&params, arrow_lo, body_start)
            },
            params,
            return_type: arrow.return_type.as_deref(),
            is_async: arrow.is_async,
            is_generator: arrow.is_generator,
            is_arrow: true,
            bare_param,
            body_start,
        }
    }

    /// Finds the `)` between the last parameter and the body.
    fn params_close(&self, params: &[&Pat], fn_lo: usize, body_start: usize) -> Option<usize> {
        let from = params
            .last()
            .map(|param| self.script.hi(param.span()))
            .unwrap_or(fn_lo);
        let between = self.source.get(from..body_start)?;
        between.find(')').map(|idx| from + idx)
    }

    fn string_contents(&self, span: swc_common::Span) -> String {
        let lo = self.script.lo(span);
        let hi = self.script.hi(span);
        self.source
            .get(lo + 1..hi.saturating_sub(1))
            .unwrap_or_default()
            .to_string()
    }
}

fn function_annotated(shape: &FunctionShape<'_>) -> bool {
    shape.return_type.is_some() || shape.params.first().is_some_and(|p| pat_has_type_ann(p))
}

fn bindings(decl: &Decl) -> Vec<(String, Binding<'_>)> {
    match decl {
        Decl::Fn(f) => vec![(f.ident.sym.to_string(), Binding::Function(&f.function))],
        Decl::Class(c) => vec![(c.ident.sym.to_string(), Binding::Other)],
        Decl::TsEnum(e) => vec![(e.id.sym.to_string(), Binding::Other)],
        Decl::Var(var) => var
            .decls
            .iter()
            .flat_map(|declarator| match &declarator.name {
                Pat::Ident(ident) => vec![(ident.id.sym.to_string(), Binding::Declarator(declarator))],
                pat => {
                    let typed = pat_has_type_ann(pat);
                    let mut names = Vec::new();
                    pattern_names(pat, &mut names);
                    names
                        .into_iter()
                        .map(|name| (name, Binding::Pattern { typed }))
                        .collect()
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Collects every identifier bound by a destructuring pattern.
pub(crate) fn pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => names.push(ident.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pattern_names(elem, names);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, names),
                    ObjectPatProp::Assign(assign) => names.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, names),
                }
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, names),
        Pat::Assign(assign) => pattern_names(&assign.left, names),
        _ => {}
    }
}

pub(crate) fn pat_has_type_ann(pat: &Pat) -> bool {
    match pat {
        Pat::Ident(ident) => ident.type_ann.is_some(),
        Pat::Array(arr) => arr.type_ann.is_some(),
        Pat::Object(obj) => obj.type_ann.is_some(),
        Pat::Assign(assign) => pat_has_type_ann(&assign.left),
        Pat::Rest(rest) => rest.type_ann.is_some() || pat_has_type_ann(&rest.arg),
        _ => false,
    }
}

fn unparen(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(paren) => unparen(&paren.expr),
        expr => expr,
    }
}

/// True when the statement at `stmt_lo` is directly preceded by a JSDoc block
/// carrying a type tag.
fn has_jsdoc_type(source: &str, stmt_lo: usize) -> bool {
    let before = source.get(..stmt_lo).unwrap_or_default().trim_end();
    let Some(body) = before.strip_suffix("*/") else {
        return false;
    };
    let Some(open) = body.rfind("/**") else {
        return false;
    };
    body[open + 3..].split('@').skip(1).any(|tag| {
        matches!(
            tag.split(|c: char| !c.is_ascii_alphabetic()).next(),
            Some("type" | "param" | "returns" | "return" | "satisfies")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan_ts(source: &str) -> (ParsedScript, String) {
        (
            ParsedScript::parse("test.ts", source, true).unwrap(),
            source.to_string(),
        )
    }

    #[test]
    fn test_classifies_exports() {
        let (script, source) = scan_ts(
            "import { x } from './x';\n\
             const hidden = 1;\n\
             let { a, b: [c] } = obj;\n\
             export function load(event) {}\n\
             export const handler = async (req) => req;\n\
             export let count = 0;\n\
             export class Widget {}\n\
             function helper() {}\n\
             export { helper as run };\n",
        );
        let result = scan(&script, &source, true, ScanMode::Module).unwrap();

        let names: Vec<_> = result.exports.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["load", "handler", "count", "Widget", "run"]);
        assert!(result.exports["load"].as_function().is_some());
        assert!(result.exports["handler"].as_function().unwrap().is_async);
        assert!(result.exports["count"].as_variable().unwrap().has_initializer());
        assert_eq!(result.exports["run"].local, "helper");
        assert!(result.exports["run"].as_function().is_some());

        for name in ["x", "hidden", "a", "c", "helper"] {
            assert!(result.declared.contains(name), "{name} should be declared");
        }
        assert!(!result.declared.contains("load"));
        assert!(result.is_declared("count"));
    }

    #[test]
    fn test_undeclared_export_clause_local_is_not_declared() {
        let (script, source) = scan_ts("$: doubled = 2;\nlet total = 1;\nexport { doubled, total };\n");
        let result = scan(&script, &source, true, ScanMode::Component).unwrap();
        assert!(!result.exports["doubled"].is_bound);
        assert!(!result.is_declared("doubled"));
        assert!(result.is_declared("total"));
    }

    #[test]
    fn test_explicit_types_in_typescript() {
        let (script, source) = scan_ts(
            "export function a(e: Event) {}\n\
             export function b(e): void {}\n\
             export function c(e) {}\n\
             export const d: boolean = true;\n\
             export const e = {} satisfies Config;\n\
             export const f = 'x' as const;\n\
             export const g = true;\n",
        );
        let result = scan(&script, &source, true, ScanMode::Module).unwrap();
        let typed: Vec<_> = result
            .exports
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.has_explicit_type))
            .collect();
        assert_eq!(
            typed,
            vec![
                ("a", true),
                ("b", true),
                ("c", false),
                ("d", true),
                ("e", true),
                ("f", true),
                ("g", false),
            ]
        );
    }

    #[test]
    fn test_jsdoc_counts_as_type_in_javascript() {
        let source = "/** @type {import('./$types').PageLoad} */\n\
                      export const load = (event) => {};\n\
                      /** Plain description. */\n\
                      export function other(event) {}\n";
        let script = ParsedScript::parse("test.js", source, false).unwrap();
        let result = scan(&script, source, false, ScanMode::Module).unwrap();
        assert!(result.exports["load"].has_explicit_type);
        assert!(!result.exports["other"].has_explicit_type);
    }

    #[test]
    fn test_function_shape_offsets() {
        let source = "export const match = param => true;\nexport function load(event = {}) {}";
        let (script, source) = scan_ts(source);
        let result = scan(&script, &source, true, ScanMode::Module).unwrap();

        let arrow = result.exports["match"].as_function().unwrap();
        assert!(arrow.bare_param);
        assert_eq!(arrow.params_close, None);

        let load = result.exports["load"].as_function().unwrap();
        assert!(!load.bare_param);
        let close = load.params_close.unwrap();
        assert_eq!(&source[close..close + 1], ")");
        assert_eq!(&source[load.body_start..load.body_start + 1], "{");
    }

    #[test]
    fn test_component_mode_rejects_default_export() {
        let (script, source) = scan_ts("let a = 1;\nexport default a;");
        let err = scan(&script, &source, true, ScanMode::Component).unwrap_err();
        assert_eq!(err.offset, 11);
        assert!(scan(&script, &source, true, ScanMode::Module).is_ok());
    }

    #[test]
    fn test_reexport_is_rejected_in_components() {
        let (script, source) = scan_ts("export { a } from './a';");
        assert!(scan(&script, &source, true, ScanMode::Component).is_err());
        let result = scan(&script, &source, true, ScanMode::Module).unwrap();
        assert!(result.exports.is_empty());
    }

    #[test]
    fn test_jsdoc_tag_matching() {
        assert!(has_jsdoc_type("/** @returns {string} */\n", 25));
        assert!(!has_jsdoc_type("/** @typedef {Foo} Bar */\n", 26));
        assert!(!has_jsdoc_type("/* @type {Foo} */\n", 18));
    }
}
