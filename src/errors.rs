// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::types::TimeUnit;

/// Exit status reported by [`crate::exec::ExternalProcess::run`] when the OS
/// refuses to spawn the child. The process may have partially started, so
/// this is a status rather than an error.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 5;

#[derive(Error, Debug)]
pub enum ProcwardenError {
    #[error("no arguments to start an external process")]
    NoArguments,

    #[error("unbalanced quotes in command line: {line}")]
    UnbalancedQuote { line: String },

    #[error("argument line opens a scope with `$[` but never closes it with `]`: {line}")]
    UnclosedScope { line: String },

    #[error("closing `}}` not found for opening `${{` in argument: {argument}")]
    UnclosedPlaceholder { argument: String },

    #[error("no value found for required variable: {name}")]
    MissingRequiredVariable { name: String },

    #[error("external process did not finish within the given timeout of {timeout} {unit} (elapsed {elapsed:?})")]
    Timeout {
        timeout: u64,
        unit: TimeUnit,
        elapsed: Duration,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcwardenError {
    /// True for the "never finished" outcome, as opposed to "ran and failed".
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcwardenError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProcwardenError>;
