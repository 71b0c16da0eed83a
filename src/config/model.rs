// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::TimeUnit;

/// A launch profile as read from TOML, before validation.
///
/// ```toml
/// [process]
/// command = "python3 match.py $[--source ${source}] ${!target}"
/// working_dir = "work"
/// timeout = 30
/// timeout_unit = "seconds"
///
/// [env]
/// TOKENIZERS_PARALLELISM = "false"
///
/// [vars]
/// source = "a.rdf"
///
/// [paths]
/// target = "out/alignment.rdf"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawProfileFile {
    pub process: ProcessSection,

    /// Environment overrides merged over the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Plain substitution values.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Path-typed substitution values, rendered as absolute paths.
    #[serde(default)]
    pub paths: BTreeMap<String, PathBuf>,
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    /// Argument line; may contain `$[ ... ]` scopes and `${name}` variables.
    pub command: String,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Zero means no timeout.
    #[serde(default)]
    pub timeout: u64,

    #[serde(default)]
    pub timeout_unit: TimeUnit,

    #[serde(default = "default_signal_delay_ms")]
    pub signal_delay_ms: u64,

    /// Zero waits indefinitely.
    #[serde(default)]
    pub join_timeout_ms: u64,

    /// Register runtime properties, environment and launcher-flag lookups
    /// after `[vars]` and `[paths]`.
    #[serde(default = "default_true")]
    pub default_lookups: bool,
}

fn default_signal_delay_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

/// A validated launch profile. Construct via `TryFrom<RawProfileFile>`.
#[derive(Debug, Clone)]
pub struct ProfileFile {
    pub process: ProcessSection,
    pub env: BTreeMap<String, String>,
    pub vars: BTreeMap<String, String>,
    pub paths: BTreeMap<String, PathBuf>,
}

impl ProfileFile {
    pub(crate) fn new_unchecked(raw: RawProfileFile) -> Self {
        Self {
            process: raw.process,
            env: raw.env,
            vars: raw.vars,
            paths: raw.paths,
        }
    }
}
