//! Configuration loading.

use crate::cli::Args;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use svelte_shim::KitPaths;
use swc_common::SourceMap;
use swc_ecma_ast::{
    Decl, ExportDefaultExpr, Expr, KeyValueProp, Lit, ModuleDecl, ModuleItem, ObjectLit, Pat,
    Prop, PropName, PropOrSpread, Stmt,
};
use swc_ecma_parser::{parse_file_as_module, EsSyntax, Syntax, TsSyntax};
use tracing::debug;

/// The parts of `svelte.config.js` that move SvelteKit's special files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvelteConfig {
    /// `kit.files.hooks.server`
    pub hooks_server: Option<String>,
    /// `kit.files.hooks.client`
    pub hooks_client: Option<String>,
    /// `kit.files.params`
    pub params: Option<String>,
}

impl SvelteConfig {
    /// Loads configuration from the first svelte config file in `project_root`.
    pub fn load(project_root: &Utf8Path) -> Self {
        let config_files = ["svelte.config.js", "svelte.config.mjs", "svelte.config.ts"];

        for config_file in config_files {
            let config_path = project_root.join(config_file);
            if config_path.exists() {
                match Self::parse_config(&config_path) {
                    Ok(config) => {
                        debug!(path = %config_path, ?config, "loaded svelte config");
                        return config;
                    }
                    Err(e) => {
                        eprintln!("Warning: Failed to parse {}: {}", config_path, e);
                        return Self::default();
                    }
                }
            }
        }

        Self::default()
    }

    fn parse_config(path: &Utf8Path) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse_source(path, content)
    }

    /// Parses config source text using SWC.
    fn parse_source(path: &Utf8Path, content: String) -> Result<Self, String> {
        let cm: Arc<SourceMap> = Default::default();
        let fm = cm.new_source_file(
            swc_common::FileName::Custom(path.to_string()).into(),
            content,
        );

        let syntax = if path.as_str().ends_with(".ts") {
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

        let module = parse_file_as_module(
            &fm,
            syntax,
            swc_ecma_ast::EsVersion::Es2022,
            None,
            &mut Vec::new(),
        )
        .map_err(|e| format!("Parse error: {:?}", e.kind()))?;

        let mut config = SvelteConfig::default();
        for item in &module.body {
            let ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(ExportDefaultExpr {
                expr,
                ..
            })) = item
            else {
                continue;
            };
            match unwrap_expr(expr) {
                Expr::Object(obj) => config.extract_config(obj),
                // `const config = { ... }; export default config;`
                Expr::Ident(ident) => {
                    if let Some(obj) = find_object_binding(&module.body, &ident.sym) {
                        config.extract_config(obj);
                    }
                }
                _ => {}
            }
        }

        Ok(config)
    }

    fn extract_config(&mut self, obj: &ObjectLit) {
        let Some(files) = object_prop(obj, "kit").and_then(|kit| object_prop(kit, "files")) else {
            return;
        };
        if let Some(hooks) = object_prop(files, "hooks") {
            self.hooks_server = string_prop(hooks, "server");
            self.hooks_client = string_prop(hooks, "client");
        }
        self.params = string_prop(files, "params");
    }

    /// The special file locations: CLI flags win over the config file, which
    /// wins over SvelteKit's defaults.
    pub fn kit_paths(&self, args: &Args) -> KitPaths {
        let defaults = KitPaths::default();
        let pick = |flag: &Option<Utf8PathBuf>, configured: &Option<String>, default: Utf8PathBuf| {
            flag.clone()
                .or_else(|| configured.as_deref().map(Utf8PathBuf::from))
                .unwrap_or(default)
        };
        KitPaths {
            server_hooks: pick(&args.hooks_server, &self.hooks_server, defaults.server_hooks),
            client_hooks: pick(&args.hooks_client, &self.hooks_client, defaults.client_hooks),
            params: pick(&args.params_dir, &self.params, defaults.params),
        }
    }
}

/// Strips `satisfies`, `as` and parentheses around a config object.
fn unwrap_expr(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(paren) => unwrap_expr(&paren.expr),
        Expr::TsSatisfies(satisfies) => unwrap_expr(&satisfies.expr),
        Expr::TsAs(as_expr) => unwrap_expr(&as_expr.expr),
        expr => expr,
    }
}

fn find_object_binding<'a>(body: &'a [ModuleItem], name: &str) -> Option<&'a ObjectLit> {
    body.iter()
        .filter_map(|item| match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => Some(var),
            _ => None,
        })
        .flat_map(|var| var.decls.iter())
        .find_map(|decl| match (&decl.name, decl.init.as_deref().map(unwrap_expr)) {
            (Pat::Ident(ident), Some(Expr::Object(obj))) if &*ident.id.sym == name => {
                Some(obj)
            }
            _ => None,
        })
}

/// Gets a string value from a PropName.
fn prop_name_str(key: &PropName) -> Option<&str> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.as_str()),
        PropName::Str(s) => s.value.as_str(),
        _ => None,
    }
}

fn prop_value<'a>(obj: &'a ObjectLit, name: &str) -> Option<&'a Expr> {
    obj.props.iter().find_map(|prop| match prop {
        PropOrSpread::Prop(prop) => match prop.as_ref() {
            Prop::KeyValue(KeyValueProp { key, value }) if prop_name_str(key) == Some(name) => {
                Some(unwrap_expr(value))
            }
            _ => None,
        },
        PropOrSpread::Spread(_) => None,
    })
}

fn object_prop<'a>(obj: &'a ObjectLit, name: &str) -> Option<&'a ObjectLit> {
    match prop_value(obj, name)? {
        Expr::Object(inner) => Some(inner),
        _ => None,
    }
}

fn string_prop(obj: &ObjectLit, name: &str) -> Option<String> {
    match prop_value(obj, name)? {
        Expr::Lit(Lit::Str(s)) => s.value.as_str().map(str::to_string),
        Expr::Tpl(tpl) if tpl.exprs.is_empty() => {
            tpl.quasis.first().map(|quasi| quasi.raw.to_string())
        }
        _ => None,
    }
}
