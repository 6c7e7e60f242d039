//! Main orchestration logic.

use crate::cli::{Args, PositionQuery, QueryDirection};
use crate::config::SvelteConfig;
use crate::output::{FileReport, FileStatus, Formatter, Position, QueryReport, RunSummary};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use position_map::{to_offset, LineIndex};
use rayon::prelude::*;
use std::fs;
use svelte_shim::{transform_file, FileOutput, KitPaths, PositionMapper};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid glob pattern.
    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("failed to read {path}: {message}")]
    ReadFailed { path: Utf8PathBuf, message: String },

    #[error("failed to write {path}: {message}")]
    WriteFailed { path: Utf8PathBuf, message: String },

    /// A position query named a file that cannot be transformed.
    #[error("cannot map positions in {path}: {message}")]
    QueryFailed { path: Utf8PathBuf, message: String },

    #[error("offset {offset} is past the end of {path}")]
    OffsetOutOfRange { path: Utf8PathBuf, offset: u32 },
}

const DEFAULT_IGNORES: &[&str] = &["**/node_modules/**", "**/.svelte-kit/**", "**/dist/**"];

/// Runs the tool: either answers a position query or transforms files.
pub fn run(args: Args) -> Result<RunSummary, OrchestratorError> {
    let workspace = if args.workspace.is_relative() {
        std::env::current_dir()
            .map(|p| Utf8PathBuf::try_from(p).unwrap_or_default())
            .unwrap_or_default()
            .join(&args.workspace)
    } else {
        args.workspace.clone()
    };

    let kit_paths = SvelteConfig::load(&workspace).kit_paths(&args);
    debug!(?kit_paths, %workspace, "resolved project layout");

    if let Some((direction, query)) = args.query() {
        let report = run_query(&workspace, &kit_paths, direction, query)?;
        println!("{}", report.format(args.output));
        return Ok(RunSummary::default());
    }

    let files = if args.files.is_empty() {
        discover_files(&workspace, &args.ignore)?
    } else {
        args.files
            .iter()
            .map(|file| workspace.join(file))
            .collect()
    };
    info!(count = files.len(), "transforming files");

    let mut reports: Vec<FileReport> = files
        .par_iter()
        .map(|file| transform_one(&workspace, file, &kit_paths))
        .collect();
    reports.sort_by(|a, b| a.path.cmp(&b.path));

    for report in &reports {
        let Some(code) = &report.code else {
            continue;
        };
        if args.emit {
            println!("=== {} ===\n{}", report.path, code);
        }
        if let Some(out_dir) = &args.out_dir {
            write_output(&workspace.join(out_dir), report, code)?;
        }
    }

    let summary = RunSummary::from_reports(&reports);
    let formatted = Formatter::new(args.output).format(&reports, &summary);
    if args.emit {
        // Keep stdout for generated code.
        eprint!("{formatted}");
    } else {
        print!("{formatted}");
    }
    Ok(summary)
}

fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, OrchestratorError> {
    let mut ignore_builder = GlobSetBuilder::new();
    for pattern in patterns.iter().map(String::as_str).chain(DEFAULT_IGNORES.iter().copied()) {
        let glob = Glob::new(pattern).map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))?;
        ignore_builder.add(glob);
    }
    ignore_builder
        .build()
        .map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))
}

/// Finds every file that could need a shim.
fn discover_files(
    workspace: &Utf8Path,
    ignore: &[String],
) -> Result<Vec<Utf8PathBuf>, OrchestratorError> {
    let ignore_set = build_ignore_set(ignore)?;
    let files = WalkDir::new(workspace)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| Utf8PathBuf::try_from(e.into_path()).ok())
        .filter(|p| is_candidate(p))
        .filter(|p| {
            let relative = p.strip_prefix(workspace).unwrap_or(p);
            !ignore_set.is_match(relative.as_str())
        })
        .collect();
    Ok(files)
}

fn is_candidate(path: &Utf8Path) -> bool {
    let file_name = path.file_name().unwrap_or("");
    if file_name.ends_with(".d.ts") {
        return false;
    }
    matches!(path.extension(), Some("svelte" | "ts" | "js"))
}

fn transform_one(workspace: &Utf8Path, file: &Utf8Path, kit_paths: &KitPaths) -> FileReport {
    let relative = file.strip_prefix(workspace).unwrap_or(file).to_path_buf();
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            let mut report = FileReport::new(relative, FileStatus::Failed);
            report.error = Some(format!("failed to read file: {e}"));
            return report;
        }
    };

    match transform_file(&relative, &source, kit_paths) {
        Ok(Some(output)) => {
            let mut report = FileReport::new(relative, FileStatus::Transformed);
            report.kind = Some(output.label());
            match &output {
                FileOutput::Component(component) => {
                    report.mappings = Some(component.source_map().len());
                }
                FileOutput::Kit(kit) => {
                    report.insertions = kit.ledger().insertions().to_vec();
                }
            }
            report.code = Some(output.code().to_string());
            report
        }
        Ok(None) => FileReport::new(relative, FileStatus::Skipped),
        Err(err) => {
            debug!(path = %relative, %err, "transform failed");
            let mut report = FileReport::new(relative, FileStatus::Failed);
            report.location = err
                .offset()
                .map(|offset| Position::locate(&LineIndex::new(&source), offset.into()));
            report.error = Some(err.to_string());
            report
        }
    }
}

/// `Foo.svelte` is written as `Foo.svelte.ts`; SvelteKit files keep their
/// relative path.
fn output_path(out_dir: &Utf8Path, relative: &Utf8Path) -> Utf8PathBuf {
    let target = out_dir.join(relative);
    if relative.extension() == Some("svelte") {
        Utf8PathBuf::from(format!("{target}.ts"))
    } else {
        target
    }
}

fn write_output(out_dir: &Utf8Path, report: &FileReport, code: &str) -> Result<(), OrchestratorError> {
    let target = output_path(out_dir, &report.path);
    let write_failed = |e: std::io::Error| OrchestratorError::WriteFailed {
        path: target.clone(),
        message: e.to_string(),
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(&target, code).map_err(write_failed)?;
    debug!(path = %target, "wrote shim");
    Ok(())
}

fn run_query(
    workspace: &Utf8Path,
    kit_paths: &KitPaths,
    direction: QueryDirection,
    query: &PositionQuery,
) -> Result<QueryReport, OrchestratorError> {
    let path = workspace.join(&query.file);
    let source = fs::read_to_string(&path).map_err(|e| OrchestratorError::ReadFailed {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let relative = path.strip_prefix(workspace).unwrap_or(&path);
    let query_failed = |message: String| OrchestratorError::QueryFailed {
        path: query.file.clone(),
        message,
    };
    let output = transform_file(relative, &source, kit_paths)
        .map_err(|err| query_failed(err.to_string()))?
        .ok_or_else(|| query_failed("the file needs no shim".to_string()))?;

    let original_index = LineIndex::new(&source);
    let generated_index = LineIndex::new(output.code());
    let mapper = output.mapper();
    let offset = to_offset(query.offset as usize);
    let out_of_range = || OrchestratorError::OffsetOutOfRange {
        path: query.file.clone(),
        offset: query.offset,
    };

    let report = match direction {
        QueryDirection::ToGenerated => {
            if query.offset as usize > source.len() {
                return Err(out_of_range());
            }
            QueryReport {
                file: query.file.clone(),
                from: Position::locate(&original_index, offset),
                to: mapper
                    .to_generated(offset)
                    .map(|generated| Position::locate(&generated_index, generated)),
                in_generated: false,
            }
        }
        QueryDirection::ToOriginal => {
            if query.offset as usize > output.code().len() {
                return Err(out_of_range());
            }
            QueryReport::to_original(
                query.file.clone(),
                Position::locate(&generated_index, offset),
                mapper.to_original(offset),
                &original_index,
            )
        }
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_paths() {
        let out = Utf8Path::new("/tmp/out");
        assert_eq!(
            output_path(out, Utf8Path::new("src/lib/Button.svelte")),
            Utf8PathBuf::from("/tmp/out/src/lib/Button.svelte.ts")
        );
        assert_eq!(
            output_path(out, Utf8Path::new("src/routes/+page.ts")),
            Utf8PathBuf::from("/tmp/out/src/routes/+page.ts")
        );
    }

    #[test]
    fn test_candidates() {
        assert!(is_candidate(Utf8Path::new("src/App.svelte")));
        assert!(is_candidate(Utf8Path::new("src/routes/+page.server.js")));
        assert!(!is_candidate(Utf8Path::new("src/app.d.ts")));
        assert!(!is_candidate(Utf8Path::new("src/app.css")));
    }

    #[test]
    fn test_ignore_set() {
        let set = build_ignore_set(&["**/legacy/**".to_string()]).unwrap();
        assert!(set.is_match("src/legacy/Old.svelte"));
        assert!(set.is_match("node_modules/pkg/index.js"));
        assert!(set.is_match(".svelte-kit/types/route.ts"));
        assert!(!set.is_match("src/routes/+page.ts"));
        assert!(build_ignore_set(&["[".to_string()]).is_err());
    }
}
