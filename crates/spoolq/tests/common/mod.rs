//! Shared fixtures for the integration suite.
#![allow(dead_code)]

use spoolq::{expect_byte, read_decimal, ByteSource, Record, SpoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Installs a test-friendly tracing subscriber (once per process).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Polls `done` every few milliseconds until it holds or `deadline` passes.
pub fn wait_until(deadline: Duration, done: impl Fn() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(
            start.elapsed() < deadline,
            "condition not reached within {deadline:?}"
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A log-line shaped record: sequence number plus body, length-prefixed so
/// the decoder is self-delimiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub seq: u64,
    pub body: String,
}

impl LogLine {
    pub fn new(seq: u64, body: impl Into<String>) -> Self {
        Self {
            seq,
            body: body.into(),
        }
    }
}

impl Record for LogLine {
    fn encode(&self, sink: &mut Vec<u8>) {
        sink.push(b'L');
        sink.extend_from_slice(self.seq.to_string().as_bytes());
        sink.push(b' ');
        sink.extend_from_slice(self.body.len().to_string().as_bytes());
        sink.push(b':');
        sink.extend_from_slice(self.body.as_bytes());
        sink.push(b'\n');
    }

    fn decode(source: &mut dyn ByteSource) -> Result<Self, SpoolError> {
        let magic = source.read_byte()?;
        if magic != b'L' {
            return Err(SpoolError::Format("bad log line magic"));
        }
        let seq = read_decimal(source)?;
        expect_byte(source, b' ')?;
        let len = read_decimal(source)?;
        expect_byte(source, b':')?;
        let mut body = Vec::with_capacity(len as usize);
        for _ in 0..len {
            body.push(source.read_byte()?);
        }
        expect_byte(source, b'\n')?;
        String::from_utf8(body)
            .map(|body| LogLine { seq, body })
            .map_err(|_| SpoolError::Format("log line body is not utf-8"))
    }
}

/// Memory-only record whose drops are counted, for verifying that the
/// queue destroys the items it discards.
#[derive(Debug)]
pub struct DropProbe {
    pub id: u64,
    drops: Arc<AtomicUsize>,
}

impl DropProbe {
    pub fn new(id: u64, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            id,
            drops: Arc::clone(drops),
        }
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Record for DropProbe {
    fn encode(&self, sink: &mut Vec<u8>) {
        sink.extend_from_slice(self.id.to_string().as_bytes());
        sink.push(b'\n');
    }

    fn decode(_source: &mut dyn ByteSource) -> Result<Self, SpoolError> {
        Err(SpoolError::Format("drop probes are memory-only"))
    }
}
