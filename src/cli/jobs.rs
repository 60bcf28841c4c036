//! Background job commands: `serve`, `sweep` and `refresh`.

use serde::Serialize;

use crate::cli::Globals;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::jobs::CycleOutcome;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct ServeOutput {
    stopped: bool,
}

/// Start both jobs and block until Ctrl-C.
pub async fn run_serve(globals: &Globals) -> Result<()> {
    let mut app = globals.open_app()?;
    app.start_jobs();
    if !globals.output().quiet && !globals.output().json {
        eprintln!("tasklens: jobs running, press Ctrl-C to stop");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    app.shutdown().await;

    let human = HumanOutput::new("Stopped");
    emit_success(globals.output(), "serve", &ServeOutput { stopped: true }, Some(&human))
}

pub async fn run_sweep(globals: &Globals) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let outcome = app.sweep_job().run_cycle(&ctx).await;
    report("sweep", globals, &ctx, outcome)
}

pub async fn run_refresh(globals: &Globals) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let outcome = app.refresh_job().run_cycle(&ctx).await;
    report("refresh", globals, &ctx, outcome)
}

fn report(command: &str, globals: &Globals, ctx: &Context, outcome: CycleOutcome) -> Result<()> {
    match outcome {
        CycleOutcome::Swept { removed } => {
            let mut human = HumanOutput::new("Sweep complete");
            human.push_summary("Removed", removed.to_string());
            emit_success(
                globals.output(),
                command,
                &serde_json::json!({ "removed": removed }),
                Some(&human),
            )
        }
        CycleOutcome::Refreshed(snapshot) => {
            let mut human = HumanOutput::new("Analytics refreshed");
            human.push_summary("Tasks", snapshot.total().to_string());
            human.push_summary("Computed at", snapshot.computed_at.to_rfc3339());
            emit_success(globals.output(), command, &snapshot, Some(&human))
        }
        CycleOutcome::Abandoned {
            step,
            attempts,
            error,
        } => Err(Error::OperationFailed(format!(
            "{command} gave up at {step} after {attempts} attempt(s): {error}"
        ))),
        CycleOutcome::Cancelled => Err(ctx.check().err().unwrap_or(Error::Cancelled)),
    }
}
