//! tasklens analytics command.

use crate::cli::Globals;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

pub async fn run(globals: &Globals, fresh: bool) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let snapshot = if fresh {
        app.tasks().compute_analytics(&ctx).await?
    } else {
        app.tasks().get_analytics(&ctx).await?
    };

    let mut human = HumanOutput::new("Analytics");
    human.push_summary("Done", snapshot.done.to_string());
    human.push_summary("In progress", snapshot.in_progress.to_string());
    human.push_summary("Pending", snapshot.pending.to_string());
    human.push_summary(
        "Average completion",
        format!("{:.0}s", snapshot.average_completion_secs),
    );
    human.push_summary(
        "This week",
        format!(
            "{} completed, {} open",
            snapshot.weekly.completed, snapshot.weekly.uncompleted
        ),
    );
    human.push_summary("Computed at", snapshot.computed_at.to_rfc3339());

    emit_success(globals.output(), "analytics", &snapshot, Some(&human))
}
