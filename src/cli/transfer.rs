//! Bulk import and export of tasks as JSON arrays.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Globals;
use crate::error::{Error, Result};
use crate::lock;
use crate::output::{emit_success, HumanOutput};
use crate::task::NewTask;

#[derive(Serialize)]
struct ImportOutput {
    imported: usize,
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct ExportOutput {
    exported: usize,
    path: PathBuf,
}

pub async fn run_import(globals: &Globals, file: PathBuf) -> Result<()> {
    let raw = std::fs::read(&file)?;
    let tasks: Vec<NewTask> = serde_json::from_slice(&raw)
        .map_err(|err| Error::InvalidArgument(format!("{}: {err}", file.display())))?;

    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let ids = app.tasks().import_tasks(&ctx, tasks).await?;

    let mut human = HumanOutput::new("Tasks imported");
    human.push_summary("Count", ids.len().to_string());
    human.push_summary("From", file.display().to_string());

    let output = ImportOutput {
        imported: ids.len(),
        ids,
    };
    emit_success(globals.output(), "import", &output, Some(&human))
}

/// Without `--output` the array goes to stdout as-is, so it can be piped
/// straight back into `import`.
pub async fn run_export(globals: &Globals, output: Option<PathBuf>) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let tasks = app.tasks().export_tasks(&ctx).await?;
    let body = serde_json::to_vec_pretty(&tasks)?;

    let Some(path) = output else {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    };

    lock::write_atomic(&path, &body)?;

    let mut human = HumanOutput::new("Tasks exported");
    human.push_summary("Count", tasks.len().to_string());
    human.push_summary("To", path.display().to_string());

    let report = ExportOutput {
        exported: tasks.len(),
        path,
    };
    emit_success(globals.output(), "export", &report, Some(&human))
}
