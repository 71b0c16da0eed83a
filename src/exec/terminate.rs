// src/exec/terminate.rs

//! Termination supervisor: makes sure a child (and, where possible, its whole
//! process tree) is gone.
//!
//! Escalation is an explicit state machine:
//!
//! 1. Process already exited: nothing to do.
//! 2. Sessions supported and pid known: SIGTERM every process of the child's
//!    session, wait the configured grace delay, SIGKILL the session, and
//!    fall through to a direct destroy if the child is somehow still alive.
//! 3. Otherwise: destroy the child handle directly. Descendants the handle
//!    does not know about may be orphaned on such platforms.
//!
//! The OS-facing operations sit behind [`ProcessKiller`] so the escalation
//! order can be exercised with a fake.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::platform::Platform;

/// Upper bound for each helper command and for the direct destroy.
pub const HELPER_WAIT: Duration = Duration::from_secs(10);

/// Default delay between the SIGTERM and SIGKILL sweeps.
pub const DEFAULT_SIGNAL_DELAY: Duration = Duration::from_millis(3000);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

/// OS capabilities the supervisor needs.
pub trait ProcessKiller: Send {
    /// Whether the supervised child is still running.
    fn is_alive(&mut self) -> bool;

    /// Native process id, if it can still be discovered.
    fn pid(&self) -> Option<u32>;

    /// Send `signal` to every process whose session id is `sid`.
    fn signal_session(&mut self, sid: u32, signal: Signal) -> BoxFuture<'_, Result<()>>;

    /// Wait between escalation steps.
    fn pause(&mut self, delay: Duration) -> BoxFuture<'_, ()>;

    /// Forcefully destroy the child handle itself.
    fn destroy(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// What the supervisor actually did, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStep {
    AlreadyExited,
    SessionSignal { sid: u32, signal: Signal },
    GracePeriod(Duration),
    DirectDestroy,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Check,
    SessionTerm(u32),
    Grace(u32),
    SessionKill(u32),
    Verify,
    Destroy,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct TerminationSupervisor {
    platform: Platform,
    signal_delay: Duration,
}

impl TerminationSupervisor {
    pub fn new(platform: Platform, signal_delay: Duration) -> Self {
        Self {
            platform,
            signal_delay,
        }
    }

    /// Run the escalation to completion. Failures are logged, never returned:
    /// by the time this runs the outcome of the run is already decided.
    pub async fn terminate<K>(&self, killer: &mut K) -> Vec<TerminationStep>
    where
        K: ProcessKiller + ?Sized,
    {
        let mut steps = Vec::new();
        let mut state = State::Check;

        loop {
            state = match state {
                State::Check => {
                    if !killer.is_alive() {
                        steps.push(TerminationStep::AlreadyExited);
                        State::Done
                    } else {
                        info!("external process is still alive; trying to kill it now");
                        if !self.platform.supports_sessions() {
                            State::Destroy
                        } else if let Some(pid) = killer.pid() {
                            info!(sid = pid, "killing the external process tree by session id");
                            State::SessionTerm(pid)
                        } else {
                            warn!("cannot discover the pid of the external process");
                            State::Destroy
                        }
                    }
                }
                State::SessionTerm(sid) => {
                    self.signal(killer, sid, Signal::Term, &mut steps).await;
                    State::Grace(sid)
                }
                State::Grace(sid) => {
                    steps.push(TerminationStep::GracePeriod(self.signal_delay));
                    killer.pause(self.signal_delay).await;
                    State::SessionKill(sid)
                }
                State::SessionKill(sid) => {
                    self.signal(killer, sid, Signal::Kill, &mut steps).await;
                    State::Verify
                }
                State::Verify => {
                    if killer.is_alive() {
                        State::Destroy
                    } else {
                        State::Done
                    }
                }
                State::Destroy => {
                    info!(
                        "external process is now destroyed directly, which might leave orphans if it started subprocesses"
                    );
                    steps.push(TerminationStep::DirectDestroy);
                    if let Err(e) = killer.destroy().await {
                        error!(error = %e, "forcibly terminating external process failed");
                    }
                    State::Done
                }
                State::Done => break,
            };
        }

        steps
    }

    async fn signal<K>(
        &self,
        killer: &mut K,
        sid: u32,
        signal: Signal,
        steps: &mut Vec<TerminationStep>,
    ) where
        K: ProcessKiller + ?Sized,
    {
        info!(sid, signal = signal.as_str(), "signalling all processes of the session");
        steps.push(TerminationStep::SessionSignal { sid, signal });
        if let Err(e) = killer.signal_session(sid, signal).await {
            error!(sid, signal = signal.as_str(), error = %e, "could not signal child processes");
        }
    }
}

/// [`ProcessKiller`] backed by a real tokio child.
pub struct SystemKiller<'a> {
    child: &'a mut Child,
}

impl<'a> SystemKiller<'a> {
    pub fn new(child: &'a mut Child) -> Self {
        Self { child }
    }
}

impl ProcessKiller for SystemKiller<'_> {
    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "could not query external process status; assuming it is alive");
                true
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn signal_session(&mut self, sid: u32, signal: Signal) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let members = session_members(sid).await?;
            if members.is_empty() {
                debug!(sid, "no processes left in session");
                return Ok(());
            }
            let pids: Vec<String> = members.iter().map(u32::to_string).collect();
            let script = format!("kill -{} {}", signal.as_str(), pids.join(" "));
            run_helper(&script).await
        })
    }

    fn pause(&mut self, delay: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(delay))
    }

    fn destroy(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Err(e) = self.child.start_kill() {
                // Already reaped or exited between the check and the kill.
                debug!(error = %e, "kill request for external process failed");
            }
            match tokio::time::timeout(HELPER_WAIT, self.child.wait()).await {
                Ok(status) => {
                    let status = status.context("waiting for destroyed external process")?;
                    debug!(?status, "external process destroyed");
                    Ok(())
                }
                Err(_) => bail!("external process did not exit within {HELPER_WAIT:?} after kill"),
            }
        })
    }
}

/// Run `sh -c <script>` bounded by [`HELPER_WAIT`].
async fn run_helper(script: &str) -> Result<()> {
    let mut helper = Command::new("sh")
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning helper `{script}`"))?;

    match tokio::time::timeout(HELPER_WAIT, helper.wait()).await {
        Ok(status) => {
            let status = status.with_context(|| format!("waiting for helper `{script}`"))?;
            // `kill` fails for members that exited meanwhile; that is fine.
            debug!(%script, ?status, "helper finished");
            Ok(())
        }
        Err(_) => {
            let _ = helper.kill().await;
            Err(anyhow!("helper `{script}` did not finish within {HELPER_WAIT:?}"))
        }
    }
}

/// Pids of all processes in session `sid`.
///
/// Uses the process table from `sysinfo` and falls back to
/// `ps -s <sid> -o pid=` where `sysinfo` cannot read it.
pub async fn session_members(sid: u32) -> Result<Vec<u32>> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        debug!("process table unavailable; asking ps for session members");
        return session_members_ps(sid).await;
    }
    tokio::task::spawn_blocking(move || session_members_sysinfo(sid))
        .await
        .context("scanning the process table")
}

fn session_members_sysinfo(sid: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let session = Pid::from_u32(sid);
    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| process.session_id() == Some(session))
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids
}

async fn session_members_ps(sid: u32) -> Result<Vec<u32>> {
    let output = tokio::time::timeout(
        HELPER_WAIT,
        Command::new("ps")
            .arg("-s")
            .arg(sid.to_string())
            .arg("-o")
            .arg("pid=")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| anyhow!("`ps -s {sid}` did not finish within {HELPER_WAIT:?}"))?
    .with_context(|| format!("running `ps -s {sid}`"))?;

    Ok(String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect())
}
