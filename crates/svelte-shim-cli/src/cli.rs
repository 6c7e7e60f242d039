//! CLI argument parsing.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Generate type-checkable TypeScript shims for Svelte and SvelteKit projects.
#[derive(Debug, Parser)]
#[command(name = "svelte-shim")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Project root
    #[arg(long, default_value = ".")]
    pub workspace: Utf8PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Write generated files into this directory
    #[arg(long = "out-dir")]
    pub out_dir: Option<Utf8PathBuf>,

    /// Print generated code to stdout
    #[arg(long)]
    pub emit: bool,

    /// Glob patterns to ignore
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Server hooks file, without extension
    #[arg(long = "hooks-server")]
    pub hooks_server: Option<Utf8PathBuf>,

    /// Client hooks file, without extension
    #[arg(long = "hooks-client")]
    pub hooks_client: Option<Utf8PathBuf>,

    /// Directory holding param matchers
    #[arg(long = "params-dir")]
    pub params_dir: Option<Utf8PathBuf>,

    /// Map an original offset to the generated file
    #[arg(long = "to-generated", value_name = "FILE:OFFSET", value_parser = parse_query)]
    pub to_generated: Option<PositionQuery>,

    /// Map a generated offset back to the original file
    #[arg(long = "to-original", value_name = "FILE:OFFSET", value_parser = parse_query)]
    pub to_original: Option<PositionQuery>,

    /// Write the helper declarations used by generated components
    #[arg(long = "emit-shims", value_name = "PATH")]
    pub emit_shims: Option<Utf8PathBuf>,

    /// Log transformation decisions
    #[arg(short, long)]
    pub verbose: bool,

    /// Files to transform instead of scanning the workspace
    pub files: Vec<Utf8PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output
    Json,
}

/// A `FILE:OFFSET` position query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionQuery {
    pub file: Utf8PathBuf,
    pub offset: u32,
}

fn parse_query(value: &str) -> Result<PositionQuery, String> {
    let (file, offset) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected FILE:OFFSET, got `{value}`"))?;
    if file.is_empty() {
        return Err(format!("missing file in `{value}`"));
    }
    let offset = offset
        .parse()
        .map_err(|_| format!("invalid offset `{offset}`"))?;
    Ok(PositionQuery {
        file: Utf8PathBuf::from(file),
        offset,
    })
}

impl Args {
    /// The position query to answer instead of transforming the project.
    pub fn query(&self) -> Option<(QueryDirection, &PositionQuery)> {
        match (&self.to_generated, &self.to_original) {
            (Some(query), _) => Some((QueryDirection::ToGenerated, query)),
            (None, Some(query)) => Some((QueryDirection::ToOriginal, query)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDirection {
    ToGenerated,
    ToOriginal,
}
