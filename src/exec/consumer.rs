// src/exec/consumer.rs

//! Pluggable consumers for the lines a child prints.
//!
//! A consumer receives every line of one stream, in order, and is closed once
//! when the stream ends. Consumers are shared (`Arc<Mutex<_>>`) so the caller
//! can keep a handle and inspect what was collected after the run.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::types::OutputStream;

/// Receives the output of a child process line by line.
pub trait OutputConsumer: Send {
    /// Handle one line (without its line terminator).
    fn process_output(&mut self, line: &str) -> Result<()>;

    /// Called once after the last line.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> OutputConsumer for F
where
    F: FnMut(&str) + Send,
{
    fn process_output(&mut self, line: &str) -> Result<()> {
        self(line);
        Ok(())
    }
}

/// Registered consumer handle.
pub type SharedConsumer = Arc<Mutex<dyn OutputConsumer>>;

/// Wrap a consumer so it can be registered and still inspected afterwards.
pub fn shared<C: OutputConsumer + 'static>(consumer: C) -> Arc<Mutex<C>> {
    Arc::new(Mutex::new(consumer))
}

/// Lock a consumer, recovering from a poisoned mutex.
///
/// A consumer that panicked on a previous line is still offered later lines;
/// its own state decides whether that makes sense.
pub(crate) fn lock_consumer(consumer: &SharedConsumer) -> MutexGuard<'_, dyn OutputConsumer + 'static> {
    consumer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps every line in memory.
#[derive(Debug, Default, Clone)]
pub struct LineCollector {
    lines: Vec<String>,
    closed: usize,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// How often `close` was called. Exactly once after a completed run.
    pub fn close_count(&self) -> usize {
        self.closed
    }
}

impl OutputConsumer for LineCollector {
    fn process_output(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

/// Logs each line at debug level, tagged with its stream.
#[derive(Debug, Clone)]
pub struct TracingConsumer {
    stream: OutputStream,
}

impl TracingConsumer {
    pub fn new(stream: OutputStream) -> Self {
        Self { stream }
    }
}

impl OutputConsumer for TracingConsumer {
    fn process_output(&mut self, line: &str) -> Result<()> {
        debug!(stream = %self.stream, "{}", line);
        Ok(())
    }
}

/// Writes each line, newline-terminated, to any writer.
pub struct WriterConsumer<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> OutputConsumer for WriterConsumer<W> {
    fn process_output(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}").context("writing forwarded output line")
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush().context("flushing forwarded output")
    }
}

/// Locates the result a matcher-style program reports on stdout.
///
/// Such programs either print the result document itself (starting with
/// `<?xml`) or print a URL pointing at it, usually as the last line. In the
/// first case every line is spooled into a temporary file and its `file://`
/// URL is reported; in the second case the last line is inspected.
#[derive(Debug, Default)]
pub struct UrlCollector {
    seen_first_line: bool,
    spool: Option<NamedTempFile>,
    spooled_path: Option<PathBuf>,
    last_line: Option<String>,
}

impl UrlCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reported result location, if any was found.
    pub fn result_url(&self) -> Option<String> {
        if let Some(path) = &self.spooled_path {
            return Some(file_url(path));
        }
        if let Some(file) = &self.spool {
            return Some(file_url(file.path()));
        }

        let last = self.last_line.as_deref()?.trim();
        let whole_line_is_url = url_pattern()
            .find(last)
            .is_some_and(|m| m.start() == 0 && m.end() == last.len());
        if whole_line_is_url {
            return Some(last.to_string());
        }
        info!(last_line = %last, "last line of output is not a URL; searching it for one");
        find_last_url(last)
    }

    fn start_spool(&mut self, first_line: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("alignment")
            .suffix(".rdf")
            .tempfile()
            .context("creating temporary file for spooled result")?;
        writeln!(file, "{first_line}").context("writing spooled result")?;
        self.spool = Some(file);
        Ok(())
    }
}

impl OutputConsumer for UrlCollector {
    fn process_output(&mut self, line: &str) -> Result<()> {
        if !self.seen_first_line {
            self.seen_first_line = true;
            if line.trim_start().starts_with("<?xml") {
                return self.start_spool(line);
            }
        }

        match self.spool.as_mut() {
            Some(file) => writeln!(file, "{line}").context("writing spooled result"),
            None => {
                self.last_line = Some(line.to_string());
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.spool.take() {
            file.flush().context("flushing spooled result")?;
            let (_, path) = file.keep().context("keeping spooled result file")?;
            self.spooled_path = Some(path);
        }
        Ok(())
    }
}

fn url_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:https?|ftp|file)://?[^\s]*").expect("URL pattern is valid")
    })
}

/// The last URL-looking substring of `text`.
pub fn find_last_url(text: &str) -> Option<String> {
    let found = url_pattern().find_iter(text).last().map(|m| m.as_str().to_string());
    if found.is_none() {
        warn!("no text found which can be interpreted as a URL");
    }
    found
}

fn file_url(path: &std::path::Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}
