//! task - a local TODO list library
//!
//! This library provides the core functionality for the task CLI: tasks live
//! in an embedded sled database and are addressed by small integer ids that
//! are kept dense (1..N) after every delete.
//!
//! # Core Concepts
//!
//! - **Collections**: the active `tasks` list and the `archive` of finished tasks
//! - **Tags**: a single `+label` per task, parsed from free text
//! - **Renumbering**: deletes and finishes rewrite a collection into 1..N
//! - **Statistics**: completion counts over a date window of the archive
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `codec`: Key and record encoding
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `lock`: Exclusive file lock around the database
//! - `output`: Human and JSON rendering
//! - `query`: Tag filters and completion statistics
//! - `storage`: Data directory layout
//! - `store`: sled-backed task store, renumbering, and lifecycle operations
//! - `tags`: Inline `+tag` parser
//! - `task`: Task records and collections

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod query;
pub mod storage;
pub mod store;
pub mod tags;
pub mod task;

pub use error::{Error, Result};
