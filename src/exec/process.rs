// src/exec/process.rs

//! The launch controller.
//!
//! [`ExternalProcess`] collects arguments, substitution lookups, environment
//! and consumers, then [`ExternalProcess::run`] resolves the command line,
//! starts the child, drains its output, waits (bounded by the timeout) and
//! always hands the child to the termination supervisor before returning.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::args::{
    ArgumentList, LauncherFlags, Lookup, RuntimeProperties, SubstitutionChain, SubstitutionMap,
};
use crate::errors::{LAUNCH_FAILURE_EXIT_CODE, ProcwardenError, Result};
use crate::exec::conda;
use crate::exec::consumer::SharedConsumer;
use crate::exec::harvest::spawn_harvester;
use crate::exec::terminate::{DEFAULT_SIGNAL_DELAY, SystemKiller, TerminationSupervisor};
use crate::platform::Platform;
use crate::types::{OutputStream, TimeUnit};

/// Launcher prepended on platforms with sessions, so the child leads its own
/// session and the whole tree can be signalled later.
pub const SESSION_LAUNCHER: &str = "setsid";

/// One external program invocation.
///
/// Configure it, then call [`run`](Self::run). The configuration is only
/// read during a run, so the same instance can be run repeatedly.
pub struct ExternalProcess {
    platform: Platform,
    working_directory: Option<PathBuf>,
    environment: HashMap<String, String>,
    arguments: ArgumentList,
    lookups: SubstitutionChain,
    timeout: u64,
    timeout_unit: TimeUnit,
    signal_delay: Duration,
    join_timeout: Duration,
    stdout_consumers: Vec<SharedConsumer>,
    stderr_consumers: Vec<SharedConsumer>,
}

impl ExternalProcess {
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    /// Controller for an explicit platform instead of the host's.
    pub fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            working_directory: None,
            environment: HashMap::new(),
            arguments: ArgumentList::new(),
            lookups: SubstitutionChain::new(),
            timeout: 0,
            timeout_unit: TimeUnit::Seconds,
            signal_delay: DEFAULT_SIGNAL_DELAY,
            join_timeout: Duration::ZERO,
            stdout_consumers: Vec::new(),
            stderr_consumers: Vec::new(),
        }
    }

    /// Controller starting with the given literal arguments.
    pub fn from_args<I, S>(arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut process = Self::new();
        process.add_arguments(arguments);
        process
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    // ---- working directory / environment ----

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// `None` means the caller's current directory.
    pub fn set_working_directory(&mut self, dir: Option<PathBuf>) {
        self.working_directory = dir;
    }

    pub fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    pub fn add_environment_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.environment.insert(key.into(), value.into());
    }

    pub fn add_environment_map<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.environment.insert(k.into(), v.into());
        }
    }

    pub fn clear_environment(&mut self) {
        self.environment.clear();
    }

    // ---- timeouts ----

    /// Zero means no timeout.
    pub fn set_timeout(&mut self, value: u64, unit: TimeUnit) {
        self.timeout = value;
        self.timeout_unit = unit;
    }

    pub fn timeout(&self) -> (u64, TimeUnit) {
        (self.timeout, self.timeout_unit)
    }

    /// e.g. `"30 seconds"`.
    pub fn timeout_as_text(&self) -> String {
        format!("{} {}", self.timeout, self.timeout_unit)
    }

    fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| self.timeout_unit.to_duration(self.timeout))
    }

    /// Delay between the SIGTERM and SIGKILL sweeps.
    pub fn set_signal_delay(&mut self, delay: Duration) {
        self.signal_delay = delay;
    }

    pub fn signal_delay(&self) -> Duration {
        self.signal_delay
    }

    /// Bound for joining the output harvesters. Zero waits indefinitely.
    pub fn set_join_timeout(&mut self, timeout: Duration) {
        self.join_timeout = timeout;
    }

    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    // ---- arguments ----

    pub fn add_argument(&mut self, argument: impl AsRef<str>) {
        self.arguments.add_argument(argument);
    }

    pub fn add_arguments<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arguments.add_arguments(arguments);
    }

    /// Tokens that are emitted only if all their variables resolve.
    pub fn add_argument_scope<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.arguments.add_scope(arguments);
    }

    /// Like [`add_argument_scope`](Self::add_argument_scope), from one line.
    pub fn add_argument_scope_line(&mut self, line: &str) -> Result<()> {
        self.arguments.add_scope_line(line)
    }

    /// A full argument line, possibly containing `$[ ... ]` scopes.
    pub fn add_argument_line(&mut self, line: &str) -> Result<()> {
        self.arguments.add_line(line)
    }

    pub fn clear_arguments(&mut self) {
        self.arguments.clear();
    }

    /// The fully substituted argument vector (without any launcher prefix).
    pub fn arguments(&self) -> Result<Vec<String>> {
        self.arguments.resolve(&self.lookups)
    }

    // ---- substitution lookups ----

    /// Runtime properties, environment variables and launcher flags.
    pub fn add_default_lookups(&mut self) {
        self.lookups
            .push_defaults(RuntimeProperties::system(), LauncherFlags::from_current_process());
    }

    /// Default bundle with caller-defined runtime properties and flags.
    pub fn add_default_lookups_with(&mut self, properties: RuntimeProperties, flags: LauncherFlags) {
        self.lookups.push_defaults(properties, flags);
    }

    pub fn add_substitution_map(&mut self, map: SubstitutionMap) {
        self.lookups.push(map);
    }

    pub fn add_lookup(&mut self, lookup: impl Lookup + 'static) {
        self.lookups.push(lookup);
    }

    pub fn clear_lookups(&mut self) {
        self.lookups.clear();
    }

    // ---- consumers ----

    pub fn add_stdout_consumer(&mut self, consumer: SharedConsumer) {
        self.stdout_consumers.push(consumer);
    }

    pub fn add_stderr_consumer(&mut self, consumer: SharedConsumer) {
        self.stderr_consumers.push(consumer);
    }

    pub fn clear_stdout_consumers(&mut self) {
        self.stdout_consumers.clear();
    }

    pub fn clear_stderr_consumers(&mut self) {
        self.stderr_consumers.clear();
    }

    // ---- running ----

    /// Run the process to completion.
    ///
    /// Returns the exit code, or [`LAUNCH_FAILURE_EXIT_CODE`] if the OS refused
    /// to start it. Fails with [`ProcwardenError::Timeout`] if it did not
    /// finish in time. Argument errors surface before anything is spawned.
    pub async fn run(&self) -> Result<i32> {
        let arguments = self.arguments()?;
        if arguments.is_empty() {
            return Err(ProcwardenError::NoArguments);
        }

        let mut environment = self.environment.clone();
        if arguments[0].contains("python") {
            conda::augment_path(&self.platform, &arguments[0], &mut environment);
        }

        let command_line = launch_command(&self.platform, &arguments);
        self.log_launch(&arguments, &environment);

        let mut command = Command::new(&command_line[0]);
        command
            .args(&command_line[1..])
            .envs(&environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(
                    program = %command_line[0],
                    error = %e,
                    "starting the external process failed; it may have started partially but will not be stopped"
                );
                return Ok(LAUNCH_FAILURE_EXIT_CODE);
            }
        };
        info!(pid = ?child.id(), "external process started");

        // Nothing between here and the final terminate may return early.
        let started = Instant::now();
        let supervisor = TerminationSupervisor::new(self.platform, self.signal_delay);

        let stdin = child.stdin.take();
        let stdout_worker = child
            .stdout
            .take()
            .map(|s| spawn_harvester(s, OutputStream::Stdout, self.stdout_consumers.clone()));
        let stderr_worker = child
            .stderr
            .take()
            .map(|s| spawn_harvester(s, OutputStream::Stderr, self.stderr_consumers.clone()));

        let finished = self.wait_for_exit(&mut child).await;

        // A running child keeps its pipes open, so the tree has to go before
        // the harvesters can see end of stream.
        let mut terminated = false;
        if finished.is_none() {
            supervisor.terminate(&mut SystemKiller::new(&mut child)).await;
            terminated = true;
        }

        self.join_harvester(stdout_worker, OutputStream::Stdout).await;
        self.join_harvester(stderr_worker, OutputStream::Stderr).await;
        close_stdin(stdin).await;

        if !terminated {
            supervisor.terminate(&mut SystemKiller::new(&mut child)).await;
        }

        match finished {
            Some(status) => {
                let code = exit_code(status);
                info!(exit_code = code, success = status.success(), "external process exited");
                Ok(code)
            }
            None => Err(ProcwardenError::Timeout {
                timeout: self.timeout,
                unit: self.timeout_unit,
                elapsed: started.elapsed(),
            }),
        }
    }

    /// `None` if the child did not finish (timeout, or still running after
    /// an interrupted wait).
    async fn wait_for_exit(&self, child: &mut Child) -> Option<ExitStatus> {
        let waited = match self.timeout_duration() {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    info!(timeout = %self.timeout_as_text(), "external process did not finish within the timeout");
                    return None;
                }
            },
            None => child.wait().await,
        };

        match waited {
            Ok(status) => Some(status),
            Err(e) => {
                error!(error = %e, "interruption while waiting for external process completion");
                match child.try_wait() {
                    Ok(Some(status)) => Some(status),
                    Ok(None) => {
                        warn!("external process still running after interrupted wait; treating it as unfinished");
                        None
                    }
                    Err(e) => {
                        error!(error = %e, "could not re-check external process status");
                        None
                    }
                }
            }
        }
    }

    async fn join_harvester(&self, worker: Option<JoinHandle<()>>, stream: OutputStream) {
        let Some(mut worker) = worker else {
            return;
        };

        let joined = if self.join_timeout.is_zero() {
            Ok((&mut worker).await)
        } else {
            tokio::time::timeout(self.join_timeout, &mut worker).await
        };

        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(%stream, error = %e, "output harvester failed");
            }
            Err(_) => {
                warn!(
                    %stream,
                    join_timeout_ms = self.join_timeout.as_millis() as u64,
                    "timeout for joining the output harvester was not enough; consumers may not have processed all output"
                );
                // Dropping the worker's future closes its end of the pipe.
                worker.abort();
            }
        }
    }

    fn log_launch(&self, arguments: &[String], environment: &HashMap<String, String>) {
        let directory = match &self.working_directory {
            Some(dir) => canonical_or_self(dir),
            None => canonical_or_self(Path::new(".")),
        };
        info!(command = %arguments.join(" "), "executing external process");
        debug!(?arguments, "command arguments");
        info!(directory = %directory.display(), "working directory");
        if self.environment.is_empty() {
            info!("no custom environment variables");
        } else {
            info!(environment = ?environment, "custom environment variables");
        }
    }
}

impl Default for ExternalProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExternalProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalProcess")
            .field("platform", &self.platform)
            .field("working_directory", &self.working_directory)
            .field("environment", &self.environment)
            .field("arguments", &self.arguments)
            .field("lookups", &self.lookups)
            .field("timeout", &self.timeout_as_text())
            .field("signal_delay", &self.signal_delay)
            .field("join_timeout", &self.join_timeout)
            .field("stdout_consumers", &self.stdout_consumers.len())
            .field("stderr_consumers", &self.stderr_consumers.len())
            .finish()
    }
}

/// Final command vector: the session launcher (where supported) followed by
/// the resolved arguments.
pub fn launch_command(platform: &Platform, arguments: &[String]) -> Vec<String> {
    let mut command = Vec::with_capacity(arguments.len() + 1);
    if platform.supports_sessions() {
        command.push(SESSION_LAUNCHER.to_string());
    }
    command.extend(arguments.iter().cloned());
    command
}

async fn close_stdin(stdin: Option<ChildStdin>) {
    if let Some(mut stdin) = stdin {
        if let Err(e) = stdin.shutdown().await {
            warn!(error = %e, "could not close stdin of external process");
        }
    }
}

/// Exit code, or `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
