//! Dotfile materializer.
//!
//! Renders a source tree whose file names encode target attributes
//! (`dot_`, `executable_`, `private_`, `readonly_`, plus user-defined
//! tokens) into a destination directory, expanding Go-style templates and
//! merging downloaded external archives along the way.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse and validate `conf/config.toml` and `conf/externals.toml`
//! - **[`source`]**: scan the source tree and decode prefix-encoded paths
//! - **[`template`]**: render templates against the host namespace
//! - **[`external`]**: fetch, cache and filter external archives
//! - **[`plan`]**: validate everything into an ordered list of writes
//! - **[`resources`]** and **[`processing`]**: idempotent `check + apply` execution
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod external;
pub mod logging;
pub mod plan;
pub mod platform;
pub mod processing;
pub mod resources;
pub mod source;
pub mod template;
