use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use procwarden::exec::terminate::BoxFuture;
use procwarden::exec::{ProcessKiller, Signal};

/// One call the supervisor made on the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillerCall {
    SignalSession { sid: u32, signal: Signal },
    Pause(Duration),
    Destroy,
}

/// A fake killer that:
/// - reports a scripted liveness and pid
/// - records every escalation call in order
/// - "dies" on SIGKILL or destroy unless told to survive them.
pub struct FakeKiller {
    alive: bool,
    pid: Option<u32>,
    survive_kill: bool,
    fail_signals: bool,
    calls: Arc<Mutex<Vec<KillerCall>>>,
}

impl FakeKiller {
    /// A running child with the given pid.
    pub fn running(pid: u32) -> Self {
        Self {
            alive: true,
            pid: Some(pid),
            survive_kill: false,
            fail_signals: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A child that already exited.
    pub fn exited() -> Self {
        Self {
            alive: false,
            ..Self::running(1)
        }
    }

    /// The pid can no longer be discovered.
    pub fn without_pid(mut self) -> Self {
        self.pid = None;
        self
    }

    /// The child survives the SIGKILL sweep (e.g. it left the session).
    pub fn surviving_kill(mut self) -> Self {
        self.survive_kill = true;
        self
    }

    /// Every `signal_session` call fails.
    pub fn failing_signals(mut self) -> Self {
        self.fail_signals = true;
        self
    }

    pub fn calls(&self) -> Vec<KillerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: KillerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProcessKiller for FakeKiller {
    fn is_alive(&mut self) -> bool {
        self.alive
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn signal_session(&mut self, sid: u32, signal: Signal) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(KillerCall::SignalSession { sid, signal });
            if self.fail_signals {
                return Err(anyhow!("helper refused to run"));
            }
            if signal == Signal::Kill && !self.survive_kill {
                self.alive = false;
            }
            Ok(())
        })
    }

    fn pause(&mut self, delay: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.record(KillerCall::Pause(delay));
        })
    }

    fn destroy(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(KillerCall::Destroy);
            self.alive = false;
            Ok(())
        })
    }
}
