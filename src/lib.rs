//! tasklens - task tracking with cached analytics
//!
//! This library provides the core of the tasklens CLI: a task store, an
//! analytics snapshot served from a cache, and two periodic jobs that keep
//! the snapshot fresh and sweep stale tasks.
//!
//! # Core Concepts
//!
//! - **Tasks**: titled work items with status, priority and due date
//! - **Snapshot**: aggregate counts computed in full and replaced whole
//! - **Read-through fallback**: an empty cache is answered by computing
//! - **Bounded retry**: jobs retry a fixed number of times, then log and give up
//!
//! # Module Organization
//!
//! - `app`: wiring and lifecycle of services and jobs
//! - `analytics`: snapshot types and computation
//! - `cache`: single-slot snapshot cache (memory or file)
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `tasklens.toml`
//! - `context`: request cancellation and deadlines
//! - `error`: Error types and result aliases
//! - `events`: injected observability (tracing, JSONL)
//! - `jobs`: refresh and sweep schedulers
//! - `lock`: File locking and atomic writes
//! - `query`: parameterized SELECT builder
//! - `retry`: bounded retry helper
//! - `service`: request-facing task facade
//! - `storage`: SQLite task and user store
//! - `task`: task domain types
//! - `user`: users and password checks

pub mod analytics;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod jobs;
pub mod lock;
pub mod output;
pub mod query;
pub mod retry;
pub mod service;
pub mod storage;
pub mod task;
pub mod user;

pub use error::{Error, Result};
