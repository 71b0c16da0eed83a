// src/lib.rs

pub mod args;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod types;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::args::{LauncherFlags, RuntimeProperties, SubstitutionMap};
use crate::cli::CliArgs;
use crate::config::{default_profile_path, load_and_validate};
use crate::exec::{ExternalProcess, WriterConsumer, shared};
use crate::platform::Platform;

/// Exit status of the CLI when the child hit its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// High-level entry point used by `main.rs`.
///
/// Builds the controller from the profile and flags, forwards the child's
/// stdout/stderr to our own, and returns the exit status to report.
pub async fn run(args: CliArgs) -> Result<i32> {
    let platform = Platform::current();
    let mut process = build_process(&args, platform)?;

    if args.dry_run {
        print_dry_run(&process)?;
        return Ok(0);
    }

    process.add_stdout_consumer(shared(WriterConsumer::new(io::stdout())));
    process.add_stderr_consumer(shared(WriterConsumer::new(io::stderr())));

    match process.run().await {
        Ok(code) => Ok(code),
        Err(e) if e.is_timeout() => {
            error!(error = %e, "external process timed out");
            Ok(TIMEOUT_EXIT_CODE)
        }
        Err(e) => Err(e.into()),
    }
}

/// Assemble a controller from an optional profile plus CLI flags.
///
/// Lookup precedence: `--var`/`--path-var`, then profile variables, then the
/// default lookups (with `-D` properties and procwarden's own flags). CLI
/// flags override profile settings, and the trailing line is appended after
/// the profile command.
pub fn build_process(args: &CliArgs, platform: Platform) -> Result<ExternalProcess> {
    let mut process = ExternalProcess::with_platform(platform);

    let mut cli_vars = SubstitutionMap::new();
    for (name, value) in &args.vars {
        cli_vars.insert(name.as_str(), value.as_str());
    }
    for (name, path) in &args.path_vars {
        cli_vars.insert(name.as_str(), PathBuf::from(path));
    }
    if !cli_vars.is_empty() {
        process.add_substitution_map(cli_vars);
    }

    let properties = args
        .defines
        .iter()
        .fold(RuntimeProperties::system(), |props, (k, v)| props.with(k, v));
    let flags = LauncherFlags::new(args.launcher_flags.iter().cloned());

    // Without an explicit profile or line, fall back to `Procwarden.toml`
    // in the current directory if there is one.
    let config_path = args.config.clone().or_else(|| {
        let default = default_profile_path();
        (args.line.is_empty() && default.is_file()).then_some(default)
    });

    if let Some(config_path) = &config_path {
        let mut profile = load_and_validate(config_path)
            .with_context(|| format!("loading profile {}", config_path.display()))?;
        if args.no_default_lookups {
            profile.process.default_lookups = false;
        }
        profile.apply_to(&mut process, &profile_root_dir(config_path), properties, flags)?;
    } else if !args.no_default_lookups {
        process.add_default_lookups_with(properties, flags);
    }

    if !args.line.is_empty() {
        process.add_argument_line(&args.line.join(" "))?;
    }

    if let Some(cwd) = &args.cwd {
        process.set_working_directory(Some(cwd.clone()));
    }
    process.add_environment_map(args.env.iter().cloned());
    if let Some(timeout) = args.timeout {
        process.set_timeout(timeout, args.timeout_unit);
    }
    if let Some(ms) = args.signal_delay_ms {
        process.set_signal_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.join_timeout_ms {
        process.set_join_timeout(Duration::from_millis(ms));
    }

    debug!(?process, "controller configured");
    Ok(process)
}

/// Directory relative paths in a profile are resolved against.
///
/// A bare file name (parent = "") falls back to the current directory.
fn profile_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_dry_run(process: &ExternalProcess) -> Result<()> {
    let arguments = process.arguments()?;
    info!(
        directory = %process
            .working_directory()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| ".".to_string()),
        timeout = %process.timeout_as_text(),
        "dry run; nothing is launched"
    );
    for arg in &arguments {
        println!("{arg}");
    }
    Ok(())
}
