// src/exec/harvest.rs

//! Background workers that drain a child's stdout and stderr.
//!
//! Both workers are spawned before the controller starts waiting for the
//! child, so a chatty child can never fill its pipe buffer and stall while we
//! are blocked on `wait()`.
//!
//! - With no consumers the stream is read in fixed-size chunks and thrown
//!   away, ignoring read errors.
//! - With consumers the stream is split into lines and every line is handed
//!   to each consumer in registration order. At end of stream every consumer
//!   is closed once. Consumer failures are logged and never stop harvesting.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::exec::consumer::{SharedConsumer, lock_consumer};
use crate::types::OutputStream;

/// Chunk size used when output is discarded.
pub const DISCARD_CHUNK_SIZE: usize = 1024;

/// Spawn the worker for one stream.
///
/// The returned handle may be dropped or aborted; an abandoned worker never
/// keeps the runtime alive.
pub fn spawn_harvester<R>(
    reader: R,
    stream: OutputStream,
    consumers: Vec<SharedConsumer>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if consumers.is_empty() {
            discard(reader, stream).await;
        } else {
            dispatch_lines(reader, stream, &consumers).await;
        }
    })
}

async fn discard<R>(mut reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; DISCARD_CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => total += n as u64,
        }
    }
    trace!(%stream, bytes = total, "discarded child output");
}

async fn dispatch_lines<R>(reader: R, stream: OutputStream, consumers: &[SharedConsumer])
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                for (index, consumer) in consumers.iter().enumerate() {
                    deliver(consumer, index, stream, &line);
                }
            }
            Err(e) => {
                debug!(%stream, error = %e, "reading child output failed; treating as end of stream");
                break;
            }
        }
    }

    close_consumers(consumers, stream);
}

fn deliver(consumer: &SharedConsumer, index: usize, stream: OutputStream, line: &str) {
    let mut guard = lock_consumer(consumer);
    match catch_unwind(AssertUnwindSafe(|| guard.process_output(line))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(%stream, consumer = index, error = %e, "output consumer failed on a line");
        }
        Err(_) => {
            warn!(%stream, consumer = index, "output consumer panicked on a line");
        }
    }
}

fn close_consumers(consumers: &[SharedConsumer], stream: OutputStream) {
    for (index, consumer) in consumers.iter().enumerate() {
        let mut guard = lock_consumer(consumer);
        match catch_unwind(AssertUnwindSafe(|| guard.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(%stream, consumer = index, error = %e, "exception during closing an output consumer; not handled");
            }
            Err(_) => {
                warn!(%stream, consumer = index, "output consumer panicked while closing");
            }
        }
    }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
