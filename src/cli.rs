// src/cli.rs

//! CLI argument parsing using `clap`.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::TimeUnit;

/// Command-line arguments for `procwarden`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procwarden",
    version,
    about = "Run an external program with a templated command line, a timeout and full process-tree cleanup.",
    long_about = None
)]
pub struct CliArgs {
    /// Launch profile (TOML). Flags given on the command line override it.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Working directory of the child (default: current directory).
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment override for the child, `KEY=VALUE`. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Substitution variable, `NAME=VALUE`. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Path-typed substitution variable, rendered as an absolute path.
    #[arg(long = "path-var", value_name = "NAME=PATH", value_parser = parse_key_val)]
    pub path_vars: Vec<(String, String)>,

    /// Runtime property visible to `${name}`, `NAME=VALUE`. Repeatable.
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub defines: Vec<(String, String)>,

    /// Timeout value; 0 disables the timeout.
    #[arg(long, value_name = "N")]
    pub timeout: Option<u64>,

    /// Unit of `--timeout`.
    #[arg(long, value_name = "UNIT", default_value = "seconds")]
    pub timeout_unit: TimeUnit,

    /// Milliseconds between the SIGTERM and SIGKILL sweeps.
    #[arg(long, value_name = "MS")]
    pub signal_delay_ms: Option<u64>,

    /// Milliseconds to wait for output draining after exit; 0 waits forever.
    #[arg(long, value_name = "MS")]
    pub join_timeout_ms: Option<u64>,

    /// Do not register runtime properties, environment and launcher flags
    /// as substitution sources.
    #[arg(long)]
    pub no_default_lookups: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCWARDEN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved argument vector and exit without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Argument line to run; may contain `$[ ... ]` scopes and `${name}`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "LINE")]
    pub line: Vec<String>,

    /// `-`-prefixed arguments procwarden itself was given, i.e. argv before
    /// the trailing line. Feeds the launcher-flag lookup.
    #[arg(skip)]
    pub launcher_flags: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse the process arguments.
pub fn parse() -> CliArgs {
    parse_from(std::env::args_os())
}

/// Parse `argv` (program name first) and record procwarden's own flags.
///
/// The trailing line always occupies the last `line.len()` entries, so
/// everything before it belongs to procwarden.
pub fn parse_from<I, T>(argv: I) -> CliArgs
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let mut args = CliArgs::parse_from(&argv);
    let own_end = argv.len().saturating_sub(args.line.len());
    args.launcher_flags = argv
        .iter()
        .take(own_end)
        .skip(1)
        .map(|a| a.to_string_lossy().into_owned())
        .filter(|a| a.starts_with('-') && a != "--")
        .collect();
    args
}
