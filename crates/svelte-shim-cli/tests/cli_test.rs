//! End-to-end tests for the `svelte-shim` binary against temporary projects.

use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct JsonReport {
    path: String,
    status: String,
    kind: Option<String>,
    #[serde(default)]
    insertions: Vec<JsonInsertion>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonInsertion {
    original_pos: u32,
    text: String,
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, content) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn run(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_svelte-shim"))
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn run_json(workspace: &Path, args: &[&str]) -> (Output, Vec<JsonReport>) {
    let mut all = vec!["--output", "json"];
    all.extend_from_slice(args);
    let output = run(workspace, &all);
    let reports = serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    });
    (output, reports)
}

const PAGE_TS: &str = "export const prerender = true;\n\nexport function load(event) {\n  return { id: event.params.id };\n}\n";

const COUNTER: &str = r#"<script>
  export let step = 1;
  let count = 0;
  $: doubled = count * 2;
</script>

<button on:click={() => (count += step)}>{doubled}</button>
"#;

#[test]
fn test_reports_every_candidate() {
    let dir = project(&[
        ("src/routes/[id]/+page.ts", PAGE_TS),
        ("src/lib/Counter.svelte", COUNTER),
        ("src/lib/util.ts", "export const answer = 42;\n"),
        ("src/app.d.ts", "declare namespace App {}\n"),
        ("node_modules/pkg/+page.ts", PAGE_TS),
    ]);
    let (output, reports) = run_json(dir.path(), &[]);
    assert!(output.status.success());

    let paths: Vec<_> = reports.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["src/lib/Counter.svelte", "src/lib/util.ts", "src/routes/[id]/+page.ts"]
    );
    assert_eq!(reports[0].status, "transformed");
    assert_eq!(reports[0].kind.as_deref(), Some("component"));
    assert_eq!(reports[1].status, "skipped");

    let page = &reports[2];
    assert_eq!(page.kind.as_deref(), Some("+page"));
    let inserted: Vec<_> = page
        .insertions
        .iter()
        .map(|ins| (ins.original_pos, ins.text.as_str()))
        .collect();
    assert_eq!(
        inserted,
        vec![
            (22, ": boolean | 'auto'"),
            (58, ": Parameters<import('./$types.js').PageLoad>[0]"),
            (59, ": ReturnType<import('./$types.js').PageLoad>"),
        ]
    );
}

#[test]
fn test_out_dir() {
    let dir = project(&[
        ("src/routes/+page.ts", PAGE_TS),
        ("src/lib/Counter.svelte", COUNTER),
    ]);
    let output = run(dir.path(), &["--out-dir", "shims"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("svelte-shim transformed 2 files"), "{stdout}");

    let component = fs::read_to_string(dir.path().join("shims/src/lib/Counter.svelte.ts")).unwrap();
    assert!(component.contains("function render() {"));
    assert!(component.contains("let doubled;\n"));
    assert!(component.contains("props: {step}"));

    let page = fs::read_to_string(dir.path().join("shims/src/routes/+page.ts")).unwrap();
    assert!(page.starts_with("export const prerender: boolean | 'auto' = true;"));
}

#[test]
fn test_failed_file_exits_with_error() {
    let dir = project(&[
        ("src/lib/Broken.svelte", "<div>\n  {#if open}\n</div>\n"),
        ("src/routes/+page.ts", PAGE_TS),
    ]);
    let output = run(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("src/lib/Broken.svelte"), "{stdout}");
    assert!(stdout.contains("Error: markup error"), "{stdout}");
    assert!(stdout.contains("1 failed"), "{stdout}");
}

#[test]
fn test_svelte_config_moves_hooks() {
    let dir = project(&[
        (
            "svelte.config.js",
            "const config = { kit: { files: { hooks: { server: 'app/server-hooks' } } } };\nexport default config;\n",
        ),
        (
            "app/server-hooks.ts",
            "export const handle = async ({ event, resolve }) => resolve(event);\n",
        ),
        ("src/hooks.server.ts", "export const handle = async ({ event, resolve }) => resolve(event);\n"),
    ]);
    let (_, reports) = run_json(dir.path(), &[]);
    let status: Vec<_> = reports
        .iter()
        .map(|r| (r.path.as_str(), r.status.as_str()))
        .collect();
    assert_eq!(
        status,
        vec![
            ("app/server-hooks.ts", "transformed"),
            ("src/hooks.server.ts", "skipped"),
            ("svelte.config.js", "skipped"),
        ]
    );

    // Flags win over the config file.
    let (_, reports) = run_json(dir.path(), &["--hooks-server", "src/hooks.server"]);
    assert_eq!(reports[0].status, "skipped");
    assert_eq!(reports[1].status, "transformed");
}

#[test]
fn test_invalid_svelte_config_warns() {
    let dir = project(&[
        ("svelte.config.js", "export default {"),
        ("src/hooks.server.ts", "export function handle({ event, resolve }) { return resolve(event); }\n"),
    ]);
    let output = run(dir.path(), &[]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Warning: Failed to parse"), "{stderr}");
}

#[test]
fn test_positional_files_and_ignores() {
    let dir = project(&[
        ("src/routes/+page.ts", PAGE_TS),
        ("src/routes/legacy/+page.ts", PAGE_TS),
        ("src/lib/Counter.svelte", COUNTER),
    ]);
    let (_, reports) = run_json(dir.path(), &["--ignore", "**/legacy/**"]);
    assert_eq!(reports.len(), 2);

    let (_, reports) = run_json(dir.path(), &["src/lib/Counter.svelte"]);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].path, "src/lib/Counter.svelte");
    assert!(reports[0].error.is_none());
}

#[test]
fn test_position_queries() {
    let dir = project(&[("src/routes/+page.ts", PAGE_TS)]);

    // `load` sits at offset 48 in the original and after one insertion of 18
    // bytes in the generated file.
    let output = run(
        dir.path(),
        &["--output", "json", "--to-generated", "src/routes/+page.ts:48"],
    );
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["to"]["offset"], 66);
    assert_eq!(value["to"]["line"], 3);

    let output = run(
        dir.path(),
        &["--output", "json", "--to-original", "src/routes/+page.ts:25"],
    );
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["in_generated"], true);
    assert_eq!(value["to"]["offset"], 22);

    let output = run(dir.path(), &["--to-original", "src/routes/+page.ts:9999"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: offset 9999"));
}

#[test]
fn test_emit_shims() {
    let dir = project(&[]);
    let shims = dir.path().join("svelte-shims.d.ts");
    let output = run(dir.path(), &["--emit-shims", shims.to_str().unwrap()]);
    assert!(output.status.success());
    let text = fs::read_to_string(shims).unwrap();
    assert!(text.contains("declare function __sveltets_partial<T>"));
}
