//! tasklens - task tracking with cached analytics
//!
//! Stores tasks in SQLite, keeps an analytics snapshot fresh in the
//! background and sweeps overdue unfinished tasks.

use clap::Parser;
use tasklens::cli::Cli;
use tasklens::error::{exit_codes, Error};
use tasklens::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // RUST_LOG wins; ignore invalid or huge filters so startup stays robust.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .or_else(|| EnvFilter::try_new(cli.default_log_filter()).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json && cli.events.as_deref().map(str::trim) != Some("-");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = emit_error(&command, &Error::Io(err), json);
            std::process::exit(exit_codes::OPERATION_FAILED);
        }
    };

    if let Err(err) = runtime.block_on(cli.run()) {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
