//! Command-line interface for tasklens
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group lives in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::App;
use crate::config::{parse_duration, Config};
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputOptions;

mod analytics;
mod jobs;
mod task;
mod transfer;
mod user;

/// tasklens - task tracking with cached analytics
///
/// Stores tasks in SQLite, serves analytics from a cache that a background
/// job refreshes, and sweeps overdue unfinished tasks.
#[derive(Parser, Debug)]
#[command(name = "tasklens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the per-user tasklens.toml)
    #[arg(long, global = true, env = "TASKLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file, overriding the configuration
    #[arg(long, global = true, env = "TASKLENS_DB")]
    pub db: Option<PathBuf>,

    /// Write JSONL events to a file, or "-" for stdout
    #[arg(long, global = true, env = "TASKLENS_EVENTS")]
    pub events: Option<String>,

    /// Request deadline (e.g. "30s")
    #[arg(long, global = true, env = "TASKLENS_TIMEOUT")]
    pub timeout: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, list, update and delete tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Import tasks from a JSON array (all or nothing)
    Import {
        /// File to read
        file: PathBuf,
    },

    /// Export every task as a JSON array
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show task analytics
    Analytics {
        /// Compute from the store instead of reading the cache
        #[arg(long)]
        fresh: bool,
    },

    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Run the refresh and sweep jobs until interrupted
    Serve,

    /// Run one retention sweep now
    Sweep,

    /// Run one analytics refresh now
    Refresh,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        title: String,

        /// Due date (RFC 3339, "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD")
        #[arg(long)]
        due: String,

        #[arg(short, long)]
        description: Option<String>,

        /// pending, in_progress or done
        #[arg(long)]
        status: Option<String>,

        /// low, medium or high
        #[arg(long)]
        priority: Option<String>,
    },

    /// List tasks. Unknown filter values are ignored.
    List {
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Exact title match
        #[arg(long)]
        title: Option<String>,

        /// Sort by due date: asc or desc
        #[arg(long)]
        sort: Option<String>,
    },

    /// Update fields of a task
    Update {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        due: Option<String>,
    },

    /// Delete a task
    Delete { id: i64 },
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user
    Add {
        name: String,

        #[arg(long, env = "TASKLENS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Verify a user's password
    Check {
        name: String,

        #[arg(long, env = "TASKLENS_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub events: Option<String>,
    pub timeout: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Globals {
    /// Load the config file and apply flag/env overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        if let Some(db) = &self.db {
            config.database.path = absolute(db);
        }
        if let Some(events) = &self.events {
            config.log.events = Some(events.clone());
        }
        Ok(config)
    }

    pub fn open_app(&self) -> Result<App> {
        App::open(&self.load_config()?)
    }

    /// Request context honouring `--timeout`.
    pub fn context(&self) -> Result<Context> {
        match &self.timeout {
            Some(raw) => Ok(Context::with_timeout(parse_duration(raw)?)),
            None => Ok(Context::background()),
        }
    }

    /// JSON events on stdout would interleave with the envelope, so they
    /// take precedence and silence regular output.
    pub fn output(&self) -> OutputOptions {
        let events_to_stdout = self
            .events
            .as_deref()
            .map(|value| value.trim() == "-")
            .unwrap_or(false);
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }
}

fn absolute(path: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Cli {
    fn globals(&self) -> Globals {
        Globals {
            config: self.config.clone(),
            db: self.db.clone(),
            events: self.events.clone(),
            timeout: self.timeout.clone(),
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Filter used when RUST_LOG is unset. Tracing is off for one-shot
    /// commands; `serve` logs at the configured level.
    pub fn default_log_filter(&self) -> String {
        match self.command {
            Commands::Serve => self
                .globals()
                .load_config()
                .map(|config| config.log.level)
                .unwrap_or_else(|_| "info".to_string()),
            _ => "off".to_string(),
        }
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let globals = self.globals();
        match self.command {
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    due,
                    description,
                    status,
                    priority,
                } => {
                    task::run_add(
                        &globals,
                        task::AddOptions {
                            title,
                            due,
                            description,
                            status,
                            priority,
                        },
                    )
                    .await
                }
                TaskCommands::List {
                    status,
                    priority,
                    title,
                    sort,
                } => {
                    task::run_list(
                        &globals,
                        task::ListOptions {
                            status,
                            priority,
                            title,
                            sort,
                        },
                    )
                    .await
                }
                TaskCommands::Update {
                    id,
                    title,
                    description,
                    status,
                    priority,
                    due,
                } => {
                    task::run_update(
                        &globals,
                        task::UpdateOptions {
                            id,
                            title,
                            description,
                            status,
                            priority,
                            due,
                        },
                    )
                    .await
                }
                TaskCommands::Delete { id } => task::run_delete(&globals, id).await,
            },
            Commands::Import { file } => transfer::run_import(&globals, file).await,
            Commands::Export { output } => transfer::run_export(&globals, output).await,
            Commands::Analytics { fresh } => analytics::run(&globals, fresh).await,
            Commands::User(cmd) => match cmd {
                UserCommands::Add { name, password } => user::run_add(&globals, name, password).await,
                UserCommands::Check { name, password } => {
                    user::run_check(&globals, name, password).await
                }
            },
            Commands::Serve => jobs::run_serve(&globals).await,
            Commands::Sweep => jobs::run_sweep(&globals).await,
            Commands::Refresh => jobs::run_refresh(&globals).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_add() {
        let cli = Cli::try_parse_from([
            "tasklens",
            "--json",
            "task",
            "add",
            "write docs",
            "--due",
            "2024-05-01",
            "--priority",
            "high",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Task(TaskCommands::Add { title, due, priority, .. }) => {
                assert_eq!(title, "write docs");
                assert_eq!(due, "2024-05-01");
                assert_eq!(priority.as_deref(), Some("high"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn events_on_stdout_silence_output() {
        let globals = Globals {
            config: None,
            db: None,
            events: Some("-".to_string()),
            timeout: None,
            json: true,
            quiet: false,
        };
        let output = globals.output();
        assert!(!output.json);
        assert!(output.quiet);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let globals = Globals {
            config: None,
            db: None,
            events: None,
            timeout: Some("soon".to_string()),
            json: false,
            quiet: false,
        };
        assert!(globals.context().is_err());
    }
}
