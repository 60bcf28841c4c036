//! tasklens task command implementations.

use serde::Serialize;

use crate::cli::Globals;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::task::{parse_timestamp, NewTask, Task, TaskFilter, TaskUpdate};

pub struct AddOptions {
    pub title: String,
    pub due: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub title: Option<String>,
    pub sort: Option<String>,
}

pub struct UpdateOptions {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
}

#[derive(Serialize)]
struct TaskCreatedOutput {
    id: i64,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskDeletedOutput {
    id: i64,
}

pub async fn run_add(globals: &Globals, options: AddOptions) -> Result<()> {
    let mut task = NewTask::new(options.title, parse_timestamp(&options.due)?);
    if let Some(description) = options.description {
        task = task.with_description(description);
    }
    if let Some(status) = options.status.as_deref() {
        task = task.with_status(status.parse()?);
    }
    if let Some(priority) = options.priority.as_deref() {
        task = task.with_priority(priority.parse()?);
    }

    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let status = task.status;
    let priority = task.priority;
    let id = app.tasks().create_task(&ctx, task).await?;

    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", id.to_string());
    human.push_summary("Status", status.to_string());
    human.push_summary("Priority", priority.to_string());

    emit_success(globals.output(), "task add", &TaskCreatedOutput { id }, Some(&human))
}

pub async fn run_list(globals: &Globals, options: ListOptions) -> Result<()> {
    let filter = TaskFilter::from_raw(
        options.status.as_deref(),
        options.priority.as_deref(),
        options.title.as_deref(),
        options.sort.as_deref(),
    );

    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let tasks = app.tasks().get_tasks(&ctx, filter).await?;

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(globals.output(), "task list", &output, Some(&human))
}

pub async fn run_update(globals: &Globals, options: UpdateOptions) -> Result<()> {
    let update = TaskUpdate {
        title: options.title,
        description: options.description,
        status: options.status.as_deref().map(str::parse).transpose()?,
        priority: options.priority.as_deref().map(str::parse).transpose()?,
        due_date: options.due.as_deref().map(parse_timestamp).transpose()?,
    };

    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let task = app.tasks().update_task(&ctx, options.id, update).await?;

    let mut human = HumanOutput::new("Task updated");
    human.push_summary("ID", task.id.to_string());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Due", task.due_date.to_rfc3339());

    emit_success(globals.output(), "task update", &task, Some(&human))
}

pub async fn run_delete(globals: &Globals, id: i64) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    app.tasks().delete_task(&ctx, id).await?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", id.to_string());
    emit_success(globals.output(), "task delete", &TaskDeletedOutput { id }, Some(&human))
}

fn task_line(task: &Task) -> String {
    format!(
        "[{}][{}] {} {} (due {})",
        task.status,
        task.priority,
        task.id,
        task.title,
        task.due_date.format("%Y-%m-%d %H:%M")
    )
}
