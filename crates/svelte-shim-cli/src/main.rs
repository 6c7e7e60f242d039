//! svelte-shim: type-checkable TypeScript shims for Svelte projects.

mod cli;
mod config;
mod orchestrator;
mod output;

use clap::Parser;
use cli::Args;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the log subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; `--verbose` enables debug logs otherwise.
fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) if verbose => EnvFilter::new("debug"),
            Err(_) => return,
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(path) = &args.emit_shims {
        std::fs::write(path, svelte_shim::SHIMS)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {path}"))?;
    }

    match orchestrator::run(args) {
        Ok(summary) => {
            if summary.failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
