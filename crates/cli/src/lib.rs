//! Command-line interface for `lunrstore`.
//!
//! [`run_cli`] is the process entry point used by the `lunrstore` binary;
//! [`run`] parses and dispatches on an existing runtime and is what the
//! integration tests drive.

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod build;
mod common;
mod enrich;
mod restore_text;

const LOG_ENV: &str = "LUNRSTORE_LOG";
const WORKSPACE_CRATES: [&str; 3] = ["lunrstore_common", "lunrstore_core", "lunrstore_cli"];

#[derive(Parser, Debug)]
#[command(
    name = "lunrstore",
    version,
    about = "Build client-side search stores and load OCR and transcript text into them"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the search store from collection metadata
    Build(build::BuildArgs),
    /// Load side-file text into an existing store
    Enrich(enrich::EnrichArgs),
    /// Rejoin the paragraphs of a raw transcript
    RestoreText(restore_text::RestoreTextArgs),
}

/// Run the CLI with `args` (program name first) on a fresh multi-threaded
/// runtime and return the process exit code.
pub fn run_cli(args: Vec<String>) -> i32 {
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create tokio runtime: {err}");
            return 1;
        }
    };

    runtime.block_on(run(args))
}

/// Parse `args` (program name first) and run the selected command.
pub async fn run(args: Vec<String>) -> i32 {
    match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Some(Commands::Build(args)) => build::run(args).await,
            Some(Commands::Enrich(args)) => enrich::run(args).await,
            Some(Commands::RestoreText(args)) => restore_text::run(&args),
            None => {
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                0
            }
        },
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

fn init_tracing() {
    // LUNRSTORE_LOG takes a plain level ("debug") applied to the workspace
    // crates, or a full filter spec like "lunrstore_core=trace,reqwest=debug"
    let filter = match std::env::var(LOG_ENV) {
        Ok(level) if is_plain_level(&level) => workspace_filter(&level),
        Ok(spec) => spec,
        Err(_) => workspace_filter("info"),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn workspace_filter(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    WORKSPACE_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
