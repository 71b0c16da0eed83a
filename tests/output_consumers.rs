// tests/output_consumers.rs

mod common;
use crate::common::init_tracing;

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use procwarden::exec::harvest::spawn_harvester;
use procwarden::exec::{
    LineCollector, OutputConsumer, SharedConsumer, TracingConsumer, UrlCollector, WriterConsumer,
    shared,
};
use procwarden::types::OutputStream;

/// Fails on every line containing "bad" and records the rest.
struct PickyConsumer {
    seen: Vec<String>,
}

impl OutputConsumer for PickyConsumer {
    fn process_output(&mut self, line: &str) -> anyhow::Result<()> {
        if line.contains("bad") {
            return Err(anyhow!("refusing {line}"));
        }
        self.seen.push(line.to_string());
        Ok(())
    }
}

struct PanickyConsumer;

impl OutputConsumer for PanickyConsumer {
    fn process_output(&mut self, line: &str) -> anyhow::Result<()> {
        if line == "boom" {
            panic!("consumer blew up");
        }
        Ok(())
    }
}

/// Counts lines, then fails (or panics) when closed.
struct BadCloser {
    lines: usize,
    panic_on_close: bool,
}

impl OutputConsumer for BadCloser {
    fn process_output(&mut self, _line: &str) -> anyhow::Result<()> {
        self.lines += 1;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.panic_on_close {
            panic!("close blew up");
        }
        Err(anyhow!("cannot flush"))
    }
}

#[tokio::test]
async fn harvester_splits_lines_and_strips_terminators() {
    init_tracing();
    let collector = shared(LineCollector::new());
    let consumers: Vec<SharedConsumer> = vec![collector.clone()];

    spawn_harvester(&b"first\r\nsecond\n\nlast"[..], OutputStream::Stdout, consumers)
        .await
        .unwrap();

    let collector = collector.lock().unwrap();
    assert_eq!(collector.lines(), ["first", "second", "", "last"]);
    assert_eq!(collector.close_count(), 1);
}

#[tokio::test]
async fn harvester_feeds_every_consumer_in_order() {
    init_tracing();
    let first = shared(LineCollector::new());
    let second = shared(LineCollector::new());
    let consumers: Vec<SharedConsumer> = vec![first.clone(), second.clone()];

    spawn_harvester(&b"a\nb\nc\n"[..], OutputStream::Stderr, consumers)
        .await
        .unwrap();

    for c in [&first, &second] {
        let c = c.lock().unwrap();
        assert_eq!(c.lines(), ["a", "b", "c"]);
        assert_eq!(c.close_count(), 1);
    }
}

#[tokio::test]
async fn failing_consumer_does_not_stop_harvesting() {
    init_tracing();
    let picky = shared(PickyConsumer { seen: Vec::new() });
    let collector = shared(LineCollector::new());
    let consumers: Vec<SharedConsumer> =
        vec![picky.clone(), shared(PanickyConsumer), collector.clone()];

    spawn_harvester(&b"ok\nbad\nboom\nfine\n"[..], OutputStream::Stdout, consumers)
        .await
        .unwrap();

    assert_eq!(picky.lock().unwrap().seen, vec!["ok", "boom", "fine"]);
    let collector = collector.lock().unwrap();
    assert_eq!(collector.lines(), ["ok", "bad", "boom", "fine"]);
    assert_eq!(collector.close_count(), 1);
}

#[tokio::test]
async fn failing_close_does_not_skip_later_consumers() {
    init_tracing();
    let failing = shared(BadCloser { lines: 0, panic_on_close: false });
    let panicking = shared(BadCloser { lines: 0, panic_on_close: true });
    let collector = shared(LineCollector::new());
    let consumers: Vec<SharedConsumer> =
        vec![failing.clone(), panicking.clone(), collector.clone()];

    spawn_harvester(&b"x\ny\n"[..], OutputStream::Stdout, consumers)
        .await
        .unwrap();

    assert_eq!(failing.lock().unwrap().lines, 2);
    assert_eq!(panicking.lock().unwrap().lines, 2);
    let collector = collector.lock().unwrap();
    assert_eq!(collector.lines(), ["x", "y"]);
    assert_eq!(collector.close_count(), 1);
}

#[tokio::test]
async fn invalid_utf8_is_decoded_lossily() {
    init_tracing();
    let collector = shared(LineCollector::new());
    let consumers: Vec<SharedConsumer> = vec![collector.clone()];

    spawn_harvester(&b"ok\xff\n"[..], OutputStream::Stdout, consumers)
        .await
        .unwrap();

    assert_eq!(collector.lock().unwrap().lines(), ["ok\u{FFFD}"]);
}

#[tokio::test]
async fn harvester_without_consumers_drains_everything() {
    init_tracing();
    let (mut writer, reader) = tokio::io::duplex(64);
    let worker = spawn_harvester(reader, OutputStream::Stdout, Vec::new());

    // Far more than the duplex buffer: only completes if the reader drains.
    let payload = vec![b'x'; 256 * 1024];
    tokio::io::AsyncWriteExt::write_all(&mut writer, &payload)
        .await
        .unwrap();
    drop(writer);

    worker.await.unwrap();
}

#[tokio::test]
async fn closures_are_consumers() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let consumers: Vec<SharedConsumer> = vec![shared(move |line: &str| {
        sink.lock().unwrap().push(line.len());
    })];

    spawn_harvester(&b"a\nbb\nccc\n"[..], OutputStream::Stdout, consumers)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn tracing_consumer_accepts_every_line() {
    init_tracing();
    let mut consumer = TracingConsumer::new(OutputStream::Stderr);
    consumer.process_output("warning: something").unwrap();
    consumer.process_output("").unwrap();
    consumer.close().unwrap();
}

#[test]
fn writer_consumer_writes_newline_terminated_lines() {
    let mut consumer = WriterConsumer::new(Vec::new());
    consumer.process_output("one").unwrap();
    consumer.process_output("two").unwrap();
    consumer.close().unwrap();
    assert_eq!(consumer.into_inner(), b"one\ntwo\n");
}

#[test]
fn url_collector_reports_last_line_url() {
    let mut collector = UrlCollector::new();
    for line in ["loading model", "matching", "http://example.org/result.rdf"] {
        collector.process_output(line).unwrap();
    }
    collector.close().unwrap();
    assert_eq!(
        collector.result_url().as_deref(),
        Some("http://example.org/result.rdf")
    );
}

#[test]
fn url_collector_searches_last_line_for_url() {
    let mut collector = UrlCollector::new();
    collector
        .process_output("result written to file:///tmp/a.rdf and file:///tmp/b.rdf done")
        .unwrap();
    collector.close().unwrap();
    assert_eq!(collector.result_url().as_deref(), Some("file:///tmp/b.rdf"));
}

#[test]
fn url_collector_without_url_reports_nothing() {
    let mut collector = UrlCollector::new();
    collector.process_output("no location here").unwrap();
    collector.close().unwrap();
    assert_eq!(collector.result_url(), None);

    assert_eq!(UrlCollector::new().result_url(), None);
}

#[test]
fn url_collector_spools_xml_documents_to_a_file() {
    let mut collector = UrlCollector::new();
    let document = [
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
        "<rdf:RDF>",
        "</rdf:RDF>",
    ];
    for line in document {
        collector.process_output(line).unwrap();
    }
    collector.close().unwrap();

    let url = collector.result_url().expect("spooled file url");
    assert!(url.starts_with("file://"), "unexpected url {url}");
    let path = url.trim_start_matches("file://");
    let path = if cfg!(windows) { path.trim_start_matches('/') } else { path };
    let contents = std::fs::read_to_string(path).unwrap();
    assert_eq!(contents, format!("{}\n", document.join("\n")));
    std::fs::remove_file(path).unwrap();
}
