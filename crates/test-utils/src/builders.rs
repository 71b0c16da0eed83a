#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procwarden::args::SubstitutionMap;
use procwarden::exec::{ExternalProcess, LineCollector, shared};
use procwarden::platform::Platform;
use procwarden::types::TimeUnit;

/// Builder for `ExternalProcess` to simplify test setup.
///
/// Defaults differ from the library ones where tests care: no signal delay,
/// so terminating a hung child does not stall the test.
pub struct ProcessBuilder {
    process: ExternalProcess,
    vars: SubstitutionMap,
}

impl ProcessBuilder {
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    pub fn with_platform(platform: Platform) -> Self {
        let mut process = ExternalProcess::with_platform(platform);
        process.set_signal_delay(Duration::ZERO);
        Self {
            process,
            vars: SubstitutionMap::new(),
        }
    }

    /// Append an argument line (scopes and placeholders allowed).
    pub fn line(mut self, line: &str) -> Self {
        self.process
            .add_argument_line(line)
            .expect("Failed to parse argument line in builder");
        self
    }

    /// Append a single literal argument, whitespace and all.
    pub fn arg(mut self, arg: &str) -> Self {
        self.process.add_argument(arg);
        self
    }

    /// Shell snippet run through `sh -c`.
    pub fn shell(self, script: &str) -> Self {
        self.arg("sh").arg("-c").arg(script)
    }

    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name, value);
        self
    }

    pub fn path_var(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.vars.insert(name, path.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.process.add_environment_variable(key, value);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.process.set_working_directory(Some(dir.into()));
        self
    }

    pub fn timeout(mut self, value: u64, unit: TimeUnit) -> Self {
        self.process.set_timeout(value, unit);
        self
    }

    pub fn signal_delay(mut self, delay: Duration) -> Self {
        self.process.set_signal_delay(delay);
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.process.set_join_timeout(timeout);
        self
    }

    /// Attach a fresh `LineCollector` to stdout and return its handle.
    pub fn collect_stdout(mut self) -> (Self, Arc<Mutex<LineCollector>>) {
        let collector = shared(LineCollector::new());
        self.process.add_stdout_consumer(collector.clone());
        (self, collector)
    }

    /// Attach a fresh `LineCollector` to stderr and return its handle.
    pub fn collect_stderr(mut self) -> (Self, Arc<Mutex<LineCollector>>) {
        let collector = shared(LineCollector::new());
        self.process.add_stderr_consumer(collector.clone());
        (self, collector)
    }

    pub fn build(mut self) -> ExternalProcess {
        if !self.vars.is_empty() {
            self.process.add_substitution_map(self.vars);
        }
        self.process
    }
}

impl Default for ProcessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
