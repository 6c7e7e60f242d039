//! Type augmentation for SvelteKit route, hooks and params files.
//!
//! Exports of these files have well-known types. When an export is left
//! unannotated, the matching annotation is inserted in place so the checker
//! sees a typed module, and the insertion ledger maps its diagnostics back.

use crate::error::TransformError;
use crate::scanner::{self, ExportEntry, ExportKind, FunctionShape, ScanMode};
use crate::script::ParsedScript;
use camino::{Utf8Path, Utf8PathBuf};
use position_map::{to_offset, Ledger, LedgerError};
use rustc_hash::FxHashSet;
use swc_common::Spanned;
use swc_ecma_ast::Pat;
use tracing::{debug, trace};

/// Project locations of the hooks and params files, without extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitPaths {
    pub server_hooks: Utf8PathBuf,
    pub client_hooks: Utf8PathBuf,
    pub params: Utf8PathBuf,
}

impl Default for KitPaths {
    fn default() -> Self {
        Self {
            server_hooks: Utf8PathBuf::from("src/hooks.server"),
            client_hooks: Utf8PathBuf::from("src/hooks.client"),
            params: Utf8PathBuf::from("src/params"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Page,
    Layout,
    PageServer,
    LayoutServer,
    /// `+server`, a request handler endpoint.
    Server,
}

impl RouteKind {
    /// Recognizes a route file name such as `+page.ts` or `+layout@root.js`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let name = match file_name.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => file_name,
        };
        let name = match file_name.split_once('@') {
            Some((base, _)) => base,
            None => name,
        };
        Some(match name {
            "+page" => RouteKind::Page,
            "+layout" => RouteKind::Layout,
            "+page.server" => RouteKind::PageServer,
            "+layout.server" => RouteKind::LayoutServer,
            "+server" => RouteKind::Server,
            _ => return None,
        })
    }

    /// The `$types` load function type, absent for endpoints.
    fn load_type(self) -> Option<&'static str> {
        match self {
            RouteKind::Page => Some("PageLoad"),
            RouteKind::Layout => Some("LayoutLoad"),
            RouteKind::PageServer => Some("PageServerLoad"),
            RouteKind::LayoutServer => Some("LayoutServerLoad"),
            RouteKind::Server => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KitFileKind {
    Route(RouteKind),
    ServerHooks,
    ClientHooks,
    Params,
}

impl KitFileKind {
    pub fn label(self) -> &'static str {
        match self {
            KitFileKind::Route(RouteKind::Page) => "+page",
            KitFileKind::Route(RouteKind::Layout) => "+layout",
            KitFileKind::Route(RouteKind::PageServer) => "+page.server",
            KitFileKind::Route(RouteKind::LayoutServer) => "+layout.server",
            KitFileKind::Route(RouteKind::Server) => "+server",
            KitFileKind::ServerHooks => "server hooks",
            KitFileKind::ClientHooks => "client hooks",
            KitFileKind::Params => "params",
        }
    }
}

type Matcher = fn(&Utf8Path, &KitPaths) -> Option<KitFileKind>;

/// Checked in order; the first match wins.
const MATCHERS: &[Matcher] = &[
    match_route,
    match_server_hooks,
    match_client_hooks,
    match_params,
];

/// Classifies `path` as one of the special SvelteKit file kinds.
pub fn classify(path: &Utf8Path, paths: &KitPaths) -> Option<KitFileKind> {
    if !matches!(path.extension(), Some("ts" | "js")) {
        return None;
    }
    MATCHERS.iter().find_map(|matcher| matcher(path, paths))
}

fn match_route(path: &Utf8Path, _paths: &KitPaths) -> Option<KitFileKind> {
    RouteKind::from_file_name(path.file_name()?).map(KitFileKind::Route)
}

fn is_hooks_file(path: &Utf8Path, hooks: &Utf8Path) -> bool {
    let in_index = matches!(path.file_name(), Some("index.ts" | "index.js"))
        && path.parent().is_some_and(|dir| dir.ends_with(hooks));
    in_index || path.with_extension("").ends_with(hooks)
}

fn match_server_hooks(path: &Utf8Path, paths: &KitPaths) -> Option<KitFileKind> {
    is_hooks_file(path, &paths.server_hooks).then_some(KitFileKind::ServerHooks)
}

fn match_client_hooks(path: &Utf8Path, paths: &KitPaths) -> Option<KitFileKind> {
    is_hooks_file(path, &paths.client_hooks).then_some(KitFileKind::ClientHooks)
}

fn match_params(path: &Utf8Path, paths: &KitPaths) -> Option<KitFileKind> {
    let file_name = path.file_name()?;
    let in_params = path.parent().is_some_and(|dir| dir.ends_with(&paths.params));
    (in_params && !file_name.contains(".test") && !file_name.contains(".spec"))
        .then_some(KitFileKind::Params)
}

/// The annotation an export receives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleShape {
    Function { param: String, ret: String },
    Variable { ty: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExportRule {
    name: &'static str,
    shape: RuleShape,
}

impl ExportRule {
    fn function(name: &'static str, param: impl Into<String>, ret: impl Into<String>) -> Self {
        Self {
            name,
            shape: RuleShape::Function {
                param: param.into(),
                ret: ret.into(),
            },
        }
    }

    fn variable(name: &'static str, ty: impl Into<String>) -> Self {
        Self {
            name,
            shape: RuleShape::Variable { ty: ty.into() },
        }
    }

    /// A function typed by `Parameters<T>[0]` and `ReturnType<T>`.
    fn typed_by(name: &'static str, ty: &str) -> Self {
        Self::function(name, format!("Parameters<{ty}>[0]"), format!("ReturnType<{ty}>"))
    }
}

const REQUEST_HANDLERS: &[&str] = &[
    "GET", "PUT", "POST", "PATCH", "DELETE", "OPTIONS", "HEAD", "fallback",
];

fn export_rules(kind: KitFileKind) -> Vec<ExportRule> {
    match kind {
        KitFileKind::Route(route) => {
            let mut rules = Vec::new();
            if let Some(load) = route.load_type() {
                let load = format!("import('./$types.js').{load}");
                rules.push(ExportRule::typed_by("load", &load));
                rules.push(ExportRule::variable("load", load));
            }
            if route == RouteKind::PageServer {
                rules.push(ExportRule::variable(
                    "actions",
                    "import('./$types.js').Actions",
                ));
            }
            rules.push(ExportRule::variable("prerender", "boolean | 'auto'"));
            rules.push(ExportRule::variable(
                "trailingSlash",
                "'never' | 'always' | 'ignore'",
            ));
            if route == RouteKind::Server {
                rules.extend(REQUEST_HANDLERS.iter().map(|verb| {
                    ExportRule::function(
                        verb,
                        "import('./$types.js').RequestEvent",
                        "Response | Promise<Response>",
                    )
                }));
            } else {
                rules.push(ExportRule::variable("ssr", "boolean"));
                rules.push(ExportRule::variable("csr", "boolean"));
            }
            rules
        }
        KitFileKind::ServerHooks => vec![
            ExportRule::typed_by("handleError", "import('@sveltejs/kit').HandleServerError"),
            ExportRule::typed_by("handle", "import('@sveltejs/kit').Handle"),
            ExportRule::typed_by("handleFetch", "import('@sveltejs/kit').HandleFetch"),
        ],
        KitFileKind::ClientHooks => vec![ExportRule::typed_by(
            "handleError",
            "import('@sveltejs/kit').HandleClientError",
        )],
        KitFileKind::Params => vec![ExportRule::function("match", "string", "boolean")],
    }
}

/// An augmented special file.
#[derive(Debug, Clone)]
pub struct KitOutput {
    kind: KitFileKind,
    text: String,
    ledger: Ledger,
}

impl KitOutput {
    pub fn kind(&self) -> KitFileKind {
        self.kind
    }

    /// The augmented source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The insertions that turned the original into [`KitOutput::text`].
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_parts(self) -> (KitFileKind, String, Ledger) {
        (self.kind, self.text, self.ledger)
    }
}

/// Adds missing type annotations to the exports of a special SvelteKit file.
///
/// Returns `Ok(None)` when the file is not special, cannot be parsed, or
/// needs no annotation.
pub fn augment_kit_file(
    path: &Utf8Path,
    source: &str,
    paths: &KitPaths,
) -> Result<Option<KitOutput>, TransformError> {
    let Some(kind) = classify(path, paths) else {
        return Ok(None);
    };
    let typed = path.extension() == Some("ts");
    let script = match ParsedScript::parse(path.as_str(), source, typed) {
        Ok(script) => script,
        Err(err) => {
            debug!(%path, offset = err.offset, "skipping unparsable file: {}", err.message);
            return Ok(None);
        }
    };
    let scan = scanner::scan(&script, source, typed, ScanMode::Module)
        .map_err(|err| err.into_transform(0))?;

    let mut augmentor = Augmentor {
        script: &script,
        source,
        ledger: Ledger::new(),
    };
    // One local can be exported under several rule names; annotate it once.
    let mut annotated: FxHashSet<&str> = FxHashSet::default();
    for rule in export_rules(kind) {
        let Some(entry) = scan.exports.get(rule.name) else {
            continue;
        };
        if entry.has_explicit_type {
            trace!(export = rule.name, "already typed");
            continue;
        }
        if annotated.contains(entry.local.as_str()) {
            trace!(export = rule.name, local = %entry.local, "already annotated");
            continue;
        }
        let before = augmentor.ledger.len();
        augmentor.apply(&rule, entry)?;
        if augmentor.ledger.len() > before {
            annotated.insert(&entry.local);
        }
    }

    let ledger = augmentor.ledger;
    if ledger.is_empty() {
        debug!(%path, kind = kind.label(), "nothing to annotate");
        return Ok(None);
    }
    let text = ledger.assemble(source);
    debug!(%path, kind = kind.label(), insertions = ledger.len(), "augmented");
    Ok(Some(KitOutput { kind, text, ledger }))
}

struct Augmentor<'a> {
    script: &'a ParsedScript,
    source: &'a str,
    ledger: Ledger,
}

impl Augmentor<'_> {
    fn insert(&mut self, offset: usize, text: String) -> Result<(), LedgerError> {
        trace!(offset, %text, "insert");
        self.ledger.insert(to_offset(offset), text)
    }

    fn apply(&mut self, rule: &ExportRule, entry: &ExportEntry<'_>) -> Result<(), LedgerError> {
        match (&rule.shape, &entry.kind) {
            (RuleShape::Function { param, ret }, ExportKind::Function(shape)) => {
                self.annotate_function(shape, param, ret)
            }
            (RuleShape::Variable { ty }, ExportKind::Variable(shape)) if shape.has_initializer() => {
                match shape.binding {
                    Some(binding) => {
                        let end = self.script.hi(binding.id.span);
                        self.insert(end, format!(": {ty}"))
                    }
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn annotate_function(
        &mut self,
        shape: &FunctionShape<'_>,
        param_type: &str,
        return_type: &str,
    ) -> Result<(), LedgerError> {
        let [param] = shape.params.as_slice() else {
            return Ok(());
        };
        let param_end = self.param_insert_pos(param);
        let return_type =
            (!shape.is_generator).then(|| adjust_return_type_for_async(return_type, shape.is_async));

        if shape.bare_param {
            let mut text = format!(": {param_type})");
            if let Some(return_type) = return_type {
                text.push_str(&format!(": {return_type}"));
            }
            self.insert(self.script.lo(param.span()), "(".to_string())?;
            return self.insert(param_end, text);
        }

        self.insert(param_end, format!(": {param_type}"))?;
        if let Some(return_type) = return_type {
            match shape.params_close {
                Some(close) => self.insert(close + 1, format!(": {return_type}"))?,
                None => self.insert(shape.body_start, format!(": {return_type} "))?,
            }
        }
        Ok(())
    }

    /// The type of a defaulted parameter goes after its left side.
    fn param_insert_pos(&self, param: &Pat) -> usize {
        if let Pat::Assign(assign) = param {
            return self.script.hi(assign.left.span());
        }
        let pos = self.script.hi(param.span());
        match pos.checked_sub(1).and_then(|prev| self.source.as_bytes().get(prev)) {
            Some(b')') => pos - 1,
            _ => pos,
        }
    }
}

fn adjust_return_type_for_async(return_type: &str, is_async: bool) -> String {
    if !is_async {
        return return_type.to_string();
    }
    let trimmed = return_type.trim();
    if trimmed.starts_with("Promise<") {
        return return_type.to_string();
    }
    if trimmed.starts_with("Awaited<") {
        return format!("Promise<{return_type}>");
    }
    format!("Promise<Awaited<{return_type}>>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind_of(path: &str) -> Option<KitFileKind> {
        classify(Utf8Path::new(path), &KitPaths::default())
    }

    fn augment(path: &str, source: &str) -> Option<KitOutput> {
        augment_kit_file(Utf8Path::new(path), source, &KitPaths::default()).unwrap()
    }

    #[test]
    fn test_route_file_names() {
        assert_eq!(RouteKind::from_file_name("+page.ts"), Some(RouteKind::Page));
        assert_eq!(
            RouteKind::from_file_name("+layout.server.js"),
            Some(RouteKind::LayoutServer)
        );
        assert_eq!(
            RouteKind::from_file_name("+page@(app).ts"),
            Some(RouteKind::Page)
        );
        assert_eq!(RouteKind::from_file_name("+server.ts"), Some(RouteKind::Server));
        assert_eq!(RouteKind::from_file_name("+page.svelte.ts"), None);
        assert_eq!(RouteKind::from_file_name("page.ts"), None);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            kind_of("src/routes/blog/+page.server.ts"),
            Some(KitFileKind::Route(RouteKind::PageServer))
        );
        assert_eq!(kind_of("src/hooks.server.ts"), Some(KitFileKind::ServerHooks));
        assert_eq!(kind_of("/abs/app/src/hooks.client.js"), Some(KitFileKind::ClientHooks));
        assert_eq!(
            kind_of("src/hooks.server/index.ts"),
            Some(KitFileKind::ServerHooks)
        );
        assert_eq!(kind_of("src/params/integer.ts"), Some(KitFileKind::Params));
        assert_eq!(kind_of("src/params/integer.test.ts"), None);
        assert_eq!(kind_of("src/params/nested/integer.ts"), None);
        assert_eq!(kind_of("src/lib/util.ts"), None);
        assert_eq!(kind_of("src/routes/+page.svelte"), None);
        assert_eq!(kind_of("src/myhooks.server.ts"), None);
    }

    #[test]
    fn test_route_wins_over_params() {
        assert_eq!(
            kind_of("src/params/+page.ts"),
            Some(KitFileKind::Route(RouteKind::Page))
        );
    }

    #[test]
    fn test_custom_paths() {
        let paths = KitPaths {
            server_hooks: "app/server".into(),
            client_hooks: "app/client".into(),
            params: "app/matchers".into(),
        };
        let path = Utf8Path::new("app/server.ts");
        assert_eq!(classify(path, &paths), Some(KitFileKind::ServerHooks));
        assert_eq!(
            classify(Utf8Path::new("app/matchers/slug.js"), &paths),
            Some(KitFileKind::Params)
        );
        assert_eq!(classify(Utf8Path::new("src/hooks.server.ts"), &paths), None);
    }

    #[test]
    fn test_route_wins_over_hooks() {
        let paths = KitPaths {
            server_hooks: "src/routes/+page".into(),
            client_hooks: "src/routes/+layout".into(),
            ..KitPaths::default()
        };
        assert_eq!(
            classify(Utf8Path::new("src/routes/+page.ts"), &paths),
            Some(KitFileKind::Route(RouteKind::Page))
        );
        assert_eq!(
            classify(Utf8Path::new("src/routes/+layout.js"), &paths),
            Some(KitFileKind::Route(RouteKind::Layout))
        );
        assert_eq!(
            classify(Utf8Path::new("src/routes/+page/index.ts"), &paths),
            Some(KitFileKind::ServerHooks)
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        for path in ["src/routes/+layout.ts", "src/hooks.client.ts", "src/lib/a.ts"] {
            assert_eq!(kind_of(path), kind_of(path));
        }
    }

    #[test]
    fn test_load_function_gets_two_insertions() {
        let source = "export function load(event) {\n\treturn {};\n}\n";
        let output = augment("src/routes/+page.ts", source).unwrap();
        assert_eq!(output.ledger().len(), 2);
        assert_eq!(
            output.text(),
            "export function load(event: Parameters<import('./$types.js').PageLoad>[0]): ReturnType<import('./$types.js').PageLoad> {\n\treturn {};\n}\n"
        );
    }

    #[test]
    fn test_load_with_return_type_is_untouched() {
        let source = "export function load(event): Promise<{}> {\n\treturn {};\n}\n";
        assert!(augment("src/routes/+page.ts", source).is_none());
    }

    #[test]
    fn test_async_arrow_load() {
        let source = "export const load = async ({ fetch }) => {\n\treturn {};\n};\n";
        let output = augment("src/routes/+layout.server.js", source).unwrap();
        assert_eq!(
            output.text(),
            "export const load = async ({ fetch }: Parameters<import('./$types.js').LayoutServerLoad>[0]): Promise<Awaited<ReturnType<import('./$types.js').LayoutServerLoad>>> => {\n\treturn {};\n};\n"
        );
    }

    #[test]
    fn test_page_options() {
        let source = "export const prerender = true;\nexport const ssr = false;\n";
        let output = augment("src/routes/+page.ts", source).unwrap();
        assert_eq!(
            output.text(),
            "export const prerender: boolean | 'auto' = true;\nexport const ssr: boolean = false;\n"
        );
    }

    #[test]
    fn test_load_variable_with_non_function_initializer() {
        let source = "export const load = createLoader();\n";
        let output = augment("src/routes/+layout.ts", source).unwrap();
        assert_eq!(
            output.text(),
            "export const load: import('./$types.js').LayoutLoad = createLoader();\n"
        );
    }

    #[test]
    fn test_actions_only_on_page_server() {
        let source = "export const actions = { default: async () => {} };\n";
        let output = augment("src/routes/+page.server.ts", source).unwrap();
        assert!(output
            .text()
            .starts_with("export const actions: import('./$types.js').Actions = {"));
        assert!(augment("src/routes/+layout.server.ts", source).is_none());
    }

    #[test]
    fn test_endpoint_handlers() {
        let source = "export async function GET({ url }) {\n\treturn new Response();\n}\nexport const ssr = false;\n";
        let output = augment("src/routes/api/+server.ts", source).unwrap();
        assert_eq!(output.ledger().len(), 2);
        assert_eq!(
            output.text(),
            "export async function GET({ url }: import('./$types.js').RequestEvent): Promise<Awaited<Response | Promise<Response>>> {\n\treturn new Response();\n}\nexport const ssr = false;\n"
        );
    }

    #[test]
    fn test_handler_exported_under_two_verbs() {
        let source = "async function handler(event) {\n\treturn new Response();\n}\nexport { handler as GET, handler as POST };\n";
        let output = augment("src/routes/api/+server.ts", source).unwrap();
        assert_eq!(output.ledger().len(), 2);
        assert_eq!(
            output.text(),
            "async function handler(event: import('./$types.js').RequestEvent): Promise<Awaited<Response | Promise<Response>>> {\n\treturn new Response();\n}\nexport { handler as GET, handler as POST };\n"
        );
    }

    #[test]
    fn test_option_exported_under_two_names() {
        let source = "const off = false;\nexport { off as ssr, off as csr };\n";
        let output = augment("src/routes/+page.ts", source).unwrap();
        assert_eq!(
            output.text(),
            "const off: boolean = false;\nexport { off as ssr, off as csr };\n"
        );
    }

    #[test]
    fn test_annotation_in_javascript_file_is_skipped() {
        let source = "export function load(event: LoadEvent) {\n\treturn {};\n}\n";
        assert!(augment("src/routes/+page.js", source).is_none());
    }

    #[test]
    fn test_params_bare_arrow() {
        let source = "export const match = param => /^\\d+$/.test(param);\n";
        let output = augment("src/params/integer.ts", source).unwrap();
        assert_eq!(
            output.text(),
            "export const match = (param: string): boolean => /^\\d+$/.test(param);\n"
        );
    }

    #[test]
    fn test_server_hooks() {
        let source = "export const handle = async ({ event, resolve }) => resolve(event);\n";
        let output = augment("src/hooks.server.ts", source).unwrap();
        assert_eq!(output.kind(), KitFileKind::ServerHooks);
        assert!(output
            .text()
            .contains("}: Parameters<import('@sveltejs/kit').Handle>[0]): Promise<Awaited<ReturnType<import('@sveltejs/kit').Handle>>> =>"));
    }

    #[test]
    fn test_generator_gets_no_return_type() {
        let source = "export function* match(param) {}\n";
        let output = augment("src/params/gen.ts", source).unwrap();
        assert_eq!(output.text(), "export function* match(param: string) {}\n");
    }

    #[test]
    fn test_default_parameter_type_goes_on_left_side() {
        let source = "export function match(param = '') { return true; }\n";
        let output = augment("src/params/opt.ts", source).unwrap();
        assert_eq!(
            output.text(),
            "export function match(param: string = ''): boolean { return true; }\n"
        );
    }

    #[test]
    fn test_not_applicable_files() {
        assert!(augment("src/lib/util.ts", "export function load(e) {}").is_none());
        assert!(augment("src/routes/+page.ts", "export const = ;").is_none());
        assert!(augment("src/routes/+page.ts", "export const answer = 42;").is_none());
    }

    #[test]
    fn test_augmented_positions_round_trip() {
        let source = "export const prerender = true;\nexport function load(event) {}\n";
        let output = augment("src/routes/+page.ts", source).unwrap();
        let ledger = output.ledger();
        for pos in 0..=source.len() {
            let generated = ledger.to_generated_pos(to_offset(pos));
            let back = ledger.to_original_pos(generated);
            assert!(!back.in_generated);
            assert_eq!(back.offset, to_offset(pos));
        }
        let first = &ledger.insertions()[0];
        let inside = ledger.to_original_pos(first.generated_pos + to_offset(3));
        assert!(inside.in_generated);
        assert_eq!(inside.offset, first.original_pos);
    }
}
