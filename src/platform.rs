// src/platform.rs

//! Host OS family, detected once and passed down explicitly.
//!
//! Launching and termination both branch on the OS family. Rather than
//! consulting `cfg!` deep inside those code paths, callers compute a
//! [`Platform`] once (usually [`Platform::current`]) and hand it to the
//! controller. Tests construct other platforms directly to exercise the
//! Windows or Linux branches on any host.

/// Coarse OS family, as far as process handling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Linux: `setsid` launcher and session-wide signalling are available.
    Linux,
    /// Windows: no sessions, only direct destroy of the handle.
    Windows,
    /// Any other Unix (macOS, BSDs).
    OtherUnix,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub family: OsFamily,
}

impl Platform {
    pub const fn new(family: OsFamily) -> Self {
        Self { family }
    }

    /// Platform of the running program.
    pub fn current() -> Self {
        let family = if cfg!(target_os = "linux") {
            OsFamily::Linux
        } else if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(unix) {
            OsFamily::OtherUnix
        } else {
            OsFamily::Other
        };
        Self { family }
    }

    /// Whether the child is started as a session leader and its whole
    /// session can be signalled on termination.
    pub fn supports_sessions(&self) -> bool {
        self.family == OsFamily::Linux
    }

    pub fn is_windows(&self) -> bool {
        self.family == OsFamily::Windows
    }

    /// Separator between entries of `PATH`.
    pub fn path_list_separator(&self) -> char {
        if self.is_windows() { ';' } else { ':' }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
