//! Type-checkable shims for Svelte projects.
//!
//! Two transformations turn project files into plain TypeScript that a type
//! checker understands, each paired with a [`PositionMapper`] that translates
//! checker positions back into the original file:
//!
//! - [`transpile_component`] rewrites a `.svelte` component into a module whose
//!   `render` function contains the instance script and every template
//!   expression, and whose default export describes the component's props and
//!   slots. Positions are mapped through a span [`SourceMap`].
//! - [`augment_kit_file`] inserts the type annotations SvelteKit would infer
//!   for the exports of route, hooks and params files. Positions are mapped
//!   through the insertion [`Ledger`].
//!
//! # Example
//!
//! ```
//! use camino::Utf8Path;
//! use svelte_shim::{transform_file, FileOutput, KitPaths};
//!
//! let source = "export function load(event) {\n  return {};\n}\n";
//! let output = transform_file(
//!     Utf8Path::new("src/routes/+page.ts"),
//!     source,
//!     &KitPaths::default(),
//! )
//! .unwrap()
//! .unwrap();
//! assert!(matches!(output, FileOutput::Kit(_)));
//! assert!(output.code().contains("event: Parameters<import('./$types.js').PageLoad>[0]"));
//! ```

mod component;
mod error;
mod kit;
mod scanner;
mod script;
mod slots;
mod template;

pub use component::{transpile_component, ComponentOutput};
pub use error::{ScanError, TransformError};
pub use kit::{augment_kit_file, classify, KitFileKind, KitOutput, KitPaths, RouteKind};
pub use position_map::{Ledger, PositionMapper, SourceMap};
pub use scanner::{scan, ExportEntry, ExportKind, FunctionShape, ScanMode, ScanResult, VariableShape};
pub use script::{ParsedScript, ScriptError};
pub use slots::{SlotProps, Slots};

use camino::Utf8Path;

/// Ambient declarations for the helpers referenced by transpiled components.
///
/// Include this text once per checked project, e.g. as a `.d.ts` file.
pub const SHIMS: &str = r#"declare function __sveltets_allPropsType(): any;
declare function __sveltets_partial<T>(props: T): Partial<T>;
declare function __sveltets_partial_with_any<T>(props: T): Partial<T> & Record<string, any>;
declare function __sveltets_each<T>(items: ArrayLike<T> | Iterable<T> | null | undefined): T[];
declare function __sveltets_awaited<T>(promise: T): Awaited<T>;
declare const __sveltets_any: any;
"#;

/// The transformed form of one project file.
#[derive(Debug, Clone)]
pub enum FileOutput {
    Component(ComponentOutput),
    Kit(KitOutput),
}

impl FileOutput {
    /// The generated TypeScript.
    pub fn code(&self) -> &str {
        match self {
            FileOutput::Component(output) => output.code(),
            FileOutput::Kit(output) => output.text(),
        }
    }

    /// Translates positions between the original file and [`FileOutput::code`].
    pub fn mapper(&self) -> &dyn PositionMapper {
        match self {
            FileOutput::Component(output) => output.source_map(),
            FileOutput::Kit(output) => output.ledger(),
        }
    }

    /// A short human-readable kind, such as `component` or `+page.server`.
    pub fn label(&self) -> &'static str {
        match self {
            FileOutput::Component(_) => "component",
            FileOutput::Kit(output) => output.kind().label(),
        }
    }
}

/// Transforms one project file.
///
/// `.svelte` files are transpiled; everything else goes through the SvelteKit
/// augmentor. Returns `Ok(None)` for files that need no shim.
pub fn transform_file(
    path: &Utf8Path,
    source: &str,
    paths: &KitPaths,
) -> Result<Option<FileOutput>, TransformError> {
    if path.extension() == Some("svelte") {
        return transpile_component(source).map(|output| Some(FileOutput::Component(output)));
    }
    Ok(augment_kit_file(path, source, paths)?.map(FileOutput::Kit))
}
