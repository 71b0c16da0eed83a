// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] owns the launch controller, [`ExternalProcess`].
//! - [`harvest`] drains the child's stdout/stderr on background tasks.
//! - [`consumer`] defines the [`OutputConsumer`] trait and stock consumers.
//! - [`terminate`] holds the termination supervisor and the
//!   [`ProcessKiller`] seam it talks to the OS through.
//! - [`conda`] adjusts `PATH` for interpreters inside conda environments.

pub mod conda;
pub mod consumer;
pub mod harvest;
pub mod process;
pub mod terminate;

pub use consumer::{
    LineCollector, OutputConsumer, SharedConsumer, TracingConsumer, UrlCollector, WriterConsumer,
    shared,
};
pub use process::{ExternalProcess, launch_command};
pub use terminate::{
    ProcessKiller, Signal, SystemKiller, TerminationStep, TerminationSupervisor,
};
