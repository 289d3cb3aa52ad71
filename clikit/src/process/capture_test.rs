use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use super::capture::{
    CaptureEvent, CapturedOutput, DrainSource, OutputStream, PollableReader, StreamDrain,
    ThreadedDrain,
};
use super::test_support::SharedBuffer;

/// Hands out one scripted result per `read` call, then EOF.
struct ScriptedReader {
    reads: VecDeque<std::io::Result<Vec<u8>>>,
}

impl ScriptedReader {
    fn new(reads: Vec<std::io::Result<Vec<u8>>>) -> Self {
        Self {
            reads: reads.into(),
        }
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.reads.pop_front() {
            None => Ok(0),
            Some(Err(err)) => Err(err),
            Some(Ok(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }
    }
}

impl PollableReader for ScriptedReader {
    fn wait_readable(&self) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Never has data; stands in for a pipe whose write end a grandchild keeps open.
struct SilentReader;

impl Read for SilentReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        unreachable!("read called without readiness")
    }
}

impl PollableReader for SilentReader {
    fn wait_readable(&self) -> std::io::Result<bool> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(false)
    }
}

/// Data arrives in the same instant the caller gives up.
struct CancelledMidRead {
    cancel: Arc<AtomicBool>,
}

impl Read for CancelledMidRead {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cancel.store(true, Ordering::Release);
        buf[..4].copy_from_slice(b"late");
        Ok(4)
    }
}

impl PollableReader for CancelledMidRead {
    fn wait_readable(&self) -> std::io::Result<bool> {
        Ok(true)
    }
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn drain(
    reader: ScriptedReader,
    sink: Option<super::Sink>,
    cancelled: bool,
) -> Vec<CaptureEvent> {
    let (tx, rx) = mpsc::channel();
    let handle = ThreadedDrain::start(DrainSource {
        stream: OutputStream::Stderr,
        reader,
        sink,
        events: tx,
        cancel: Arc::new(AtomicBool::new(cancelled)),
    })
    .unwrap();
    let mut events = vec![];
    while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
        events.push(event);
    }
    handle.finish();
    events
}

fn chunks_of(events: &[CaptureEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .filter_map(|event| match event {
            CaptureEvent::Chunk(OutputStream::Stderr, chunk) => Some(chunk.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn captured_output_appends_in_order_and_decodes_lossily() {
    let mut captured = CapturedOutput::new(OutputStream::Stdout);
    assert!(captured.is_empty());
    captured.append(b"ab");
    captured.append(&[0xff]);
    captured.append(b"cd");
    assert_eq!(captured.stream(), OutputStream::Stdout);
    assert_eq!(captured.len(), 5);
    assert_eq!(captured.as_bytes(), b"ab\xffcd");
    assert_eq!(captured.to_string_lossy(), "ab\u{fffd}cd");
}

#[test]
fn drain_delivers_chunks_in_read_order_then_eof() {
    let reader = ScriptedReader::new(vec![
        Ok(b"one ".to_vec()),
        Ok(b"two ".to_vec()),
        Ok(b"three".to_vec()),
    ]);
    let events = drain(reader, None, false);
    assert_eq!(
        chunks_of(&events),
        vec![b"one ".to_vec(), b"two ".to_vec(), b"three".to_vec()]
    );
    assert!(matches!(
        events.last(),
        Some(CaptureEvent::Eof(OutputStream::Stderr))
    ));
}

#[test]
fn drain_mirrors_every_chunk_into_the_sink() {
    let sink = SharedBuffer::default();
    let reader = ScriptedReader::new(vec![Ok(b"live ".to_vec()), Ok(b"output".to_vec())]);
    let events = drain(reader, Some(Box::new(sink.clone())), false);
    assert_eq!(chunks_of(&events).concat(), b"live output".to_vec());
    assert_eq!(sink.contents(), b"live output".to_vec());
}

#[test]
fn drain_retries_interrupted_reads() {
    let reader = ScriptedReader::new(vec![
        Err(std::io::Error::from(std::io::ErrorKind::Interrupted)),
        Ok(b"after".to_vec()),
    ]);
    let events = drain(reader, None, false);
    assert_eq!(chunks_of(&events), vec![b"after".to_vec()]);
    assert!(matches!(events.last(), Some(CaptureEvent::Eof(_))));
}

#[test]
fn drain_reports_read_failure_once() {
    let reader = ScriptedReader::new(vec![
        Ok(b"partial".to_vec()),
        Err(std::io::Error::other("boom")),
        Ok(b"never".to_vec()),
    ]);
    let events = drain(reader, None, false);
    assert_eq!(chunks_of(&events), vec![b"partial".to_vec()]);
    match events.last() {
        Some(CaptureEvent::Failed(OutputStream::Stderr, err)) => {
            assert_eq!(err.to_string(), "boom")
        }
        other => panic!("expected failure event, got {other:?}"),
    }
}

#[test]
fn drain_keeps_capturing_after_the_sink_breaks() {
    let reader = ScriptedReader::new(vec![Ok(b"a".to_vec()), Ok(b"b".to_vec())]);
    let events = drain(reader, Some(Box::new(BrokenSink)), false);
    assert_eq!(chunks_of(&events), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn idle_drain_returns_promptly_once_cancelled() {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let handle = ThreadedDrain::start(DrainSource {
        stream: OutputStream::Stdout,
        reader: SilentReader,
        sink: None,
        events: tx,
        cancel: Arc::clone(&cancel),
    })
    .unwrap();
    std::thread::sleep(Duration::from_millis(30));

    let started = std::time::Instant::now();
    cancel.store(true, Ordering::Release);
    handle.finish();
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert!(rx.try_recv().is_err());
}

#[test]
fn chunk_read_after_cancellation_reaches_neither_sink_nor_channel() {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let sink = SharedBuffer::default();
    ThreadedDrain::start(DrainSource {
        stream: OutputStream::Stdout,
        reader: CancelledMidRead {
            cancel: Arc::clone(&cancel),
        },
        sink: Some(Box::new(sink.clone())),
        events: tx,
        cancel,
    })
    .unwrap()
    .finish();
    assert!(sink.contents().is_empty());
    assert!(rx.try_recv().is_err());
}

#[test]
fn cancelled_drain_stops_without_events() {
    let reader = ScriptedReader::new(vec![Ok(b"ignored".to_vec())]);
    let events = drain(reader, None, true);
    assert!(events.is_empty(), "{events:?}");
}
