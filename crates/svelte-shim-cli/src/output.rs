//! Output formatting.

use crate::cli::OutputFormat;
use camino::Utf8PathBuf;
use position_map::{ByteOffset, Insertion, LineCol, LineIndex, OriginalPosition};
use serde::Serialize;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Transformed,
    /// The file needs no shim.
    Skipped,
    Failed,
}

/// The result of transforming one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Path relative to the workspace.
    pub path: Utf8PathBuf,
    pub status: FileStatus,
    /// `component`, `+page`, `server hooks`, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    /// Insertions made into a SvelteKit file.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insertions: Vec<Insertion>,
    /// Span mappings of a transpiled component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where in the original file the error points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
    /// Generated code, kept for `--emit` and `--out-dir`.
    #[serde(skip)]
    pub code: Option<String>,
}

impl FileReport {
    pub fn new(path: Utf8PathBuf, status: FileStatus) -> Self {
        Self {
            path,
            status,
            kind: None,
            insertions: Vec::new(),
            mappings: None,
            error: None,
            location: None,
            code: None,
        }
    }
}

/// A position in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
    /// Byte offset.
    pub offset: u32,
}

impl Position {
    pub fn locate(line_index: &LineIndex, offset: ByteOffset) -> Self {
        let line_col = line_index.line_col(offset).unwrap_or(LineCol::new(0, 0));
        Self {
            line: line_col.line + 1,
            column: line_col.col + 1,
            offset: u32::from(offset),
        }
    }
}

/// The answer to a `--to-generated` or `--to-original` query.
#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub file: Utf8PathBuf,
    /// The queried position.
    pub from: Position,
    /// The mapped position, or `None` when the original text was dropped.
    pub to: Option<Position>,
    /// Set when a generated position lies in text with no original.
    pub in_generated: bool,
}

impl QueryReport {
    pub fn to_original(
        file: Utf8PathBuf,
        from: Position,
        original: OriginalPosition,
        original_index: &LineIndex,
    ) -> Self {
        Self {
            file,
            from,
            to: Some(Position::locate(original_index, original.offset)),
            in_generated: original.in_generated,
        }
    }

    pub fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Human => {
                let from = format!("{}:{}:{}", self.file, self.from.line, self.from.column);
                match &self.to {
                    Some(to) => format!(
                        "{from} -> {}:{} (offset {}){}",
                        to.line,
                        to.column,
                        to.offset,
                        if self.in_generated {
                            ", inside generated text"
                        } else {
                            ""
                        }
                    ),
                    None => format!("{from} -> not present in generated code"),
                }
            }
        }
    }
}

/// Formats file reports.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, reports: &[FileReport], summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Human => Self::format_human(reports, summary),
            OutputFormat::Json => serde_json::to_string_pretty(reports).unwrap_or_default(),
        }
    }

    fn format_human(reports: &[FileReport], summary: &RunSummary) -> String {
        let mut output = String::new();

        for report in reports {
            match report.status {
                FileStatus::Transformed => {
                    let detail = match report.mappings {
                        Some(mappings) => plural(mappings, "mapping", "mappings"),
                        None => plural(report.insertions.len(), "insertion", "insertions"),
                    };
                    output.push_str(&format!(
                        "{} [{}] {}\n",
                        report.path,
                        report.kind.unwrap_or("unknown"),
                        detail
                    ));
                }
                FileStatus::Failed => {
                    let location = report
                        .location
                        .map(|pos| format!(":{}:{}", pos.line, pos.column))
                        .unwrap_or_default();
                    output.push_str(&format!(
                        "{}{}\nError: {}\n",
                        report.path,
                        location,
                        report.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                FileStatus::Skipped => {}
            }
        }

        output.push_str(&summary.format());
        output.push('\n');
        output
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

/// Summary of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub transformed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let count = |status| reports.iter().filter(|r| r.status == status).count();
        Self {
            transformed: count(FileStatus::Transformed),
            skipped: count(FileStatus::Skipped),
            failed: count(FileStatus::Failed),
        }
    }

    /// Formats the summary line.
    pub fn format(&self) -> String {
        format!(
            "====================================\nsvelte-shim transformed {}, skipped {}, {} failed",
            plural(self.transformed, "file", "files"),
            self.skipped,
            self.failed
        )
    }
}
