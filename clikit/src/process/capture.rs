use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use serde::Serialize;

use super::request::Sink;

const CHUNK_BYTES: usize = 8 * 1024;

#[cfg(unix)]
const POLL_SLICE_MS: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Append-only capture of one stream. Only the barrier that owns it appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    stream: OutputStream,
    bytes: Vec<u8>,
}

impl CapturedOutput {
    pub fn new(stream: OutputStream) -> Self {
        Self {
            stream,
            bytes: vec![],
        }
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug)]
pub(crate) enum CaptureEvent {
    Chunk(OutputStream, Vec<u8>),
    Eof(OutputStream),
    Failed(OutputStream, std::io::Error),
}

/// Everything a capture routine needs to drain one pipe.
pub(crate) struct DrainSource<R> {
    pub stream: OutputStream,
    pub reader: R,
    pub sink: Option<Sink>,
    pub events: mpsc::Sender<CaptureEvent>,
    pub cancel: Arc<AtomicBool>,
}

/// A pipe read end that can wait for data without blocking past one poll slice.
pub(crate) trait PollableReader: Read {
    /// `Ok(true)` once a `read` will not block, `Ok(false)` if the slice elapsed first.
    fn wait_readable(&self) -> std::io::Result<bool>;
}

#[cfg(unix)]
impl PollableReader for os_pipe::PipeReader {
    fn wait_readable(&self) -> std::io::Result<bool> {
        use nix::errno::Errno;
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
        use std::os::fd::AsFd;

        let mut fds = [PollFd::new(self.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(POLL_SLICE_MS)) {
            // Hang-up and error revents count as ready: the next read reports them.
            Ok(ready) => Ok(ready > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(errno) => Err(std::io::Error::from(errno)),
        }
    }
}

// No readiness primitive here; reads block and cancellation is noticed between them.
#[cfg(not(unix))]
impl PollableReader for os_pipe::PipeReader {
    fn wait_readable(&self) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Strategy for draining a pipe read end into capture events.
///
/// Implementations must deliver chunks of one stream in read order, write each
/// chunk to the sink before delivering it, and finish with exactly one `Eof`
/// or `Failed` event unless cancelled. Once cancelled, nothing more reaches the
/// sink or the channel.
pub(crate) trait StreamDrain {
    fn start<R>(source: DrainSource<R>) -> std::io::Result<DrainHandle>
    where
        R: PollableReader + Send + 'static;
}

/// The running capture routine for one stream.
#[derive(Debug)]
pub(crate) struct DrainHandle {
    thread: std::thread::JoinHandle<()>,
}

impl DrainHandle {
    /// Wait for the routine to return. Callers set the cancel flag first.
    #[cfg(unix)]
    pub(crate) fn finish(self) {
        if self.thread.join().is_err() {
            tracing::warn!("capture thread panicked");
        }
    }

    /// Blocking reads cannot be interrupted here, so the routine is left to end on its own.
    #[cfg(not(unix))]
    pub(crate) fn finish(self) {
        drop(self.thread);
    }
}

/// Pull model: a dedicated thread doing chunked reads between readiness polls.
pub(crate) struct ThreadedDrain;

impl StreamDrain for ThreadedDrain {
    fn start<R>(source: DrainSource<R>) -> std::io::Result<DrainHandle>
    where
        R: PollableReader + Send + 'static,
    {
        std::thread::Builder::new()
            .name(format!("clikit-capture-{}", source.stream.as_str()))
            .spawn(move || drain_until_eof(source))
            .map(|thread| DrainHandle { thread })
    }
}

pub(crate) type PlatformDrain = ThreadedDrain;

fn drain_until_eof<R: PollableReader>(source: DrainSource<R>) {
    let DrainSource {
        stream,
        mut reader,
        mut sink,
        events,
        cancel,
    } = source;
    let cancelled = || cancel.load(Ordering::Acquire);
    let mut buf = vec![0u8; CHUNK_BYTES];
    loop {
        if cancelled() {
            return;
        }
        match reader.wait_readable() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                let _ = events.send(CaptureEvent::Failed(stream, err));
                return;
            }
        }
        let read = reader.read(&mut buf);
        if cancelled() {
            return;
        }
        match read {
            Ok(0) => {
                let _ = events.send(CaptureEvent::Eof(stream));
                return;
            }
            Ok(n) => {
                let chunk = &buf[..n];
                let sink_error = sink
                    .as_mut()
                    .and_then(|out| out.write_all(chunk).and_then(|()| out.flush()).err());
                if let Some(err) = sink_error {
                    // Capture continues without the mirror.
                    tracing::debug!(
                        stream = stream.as_str(),
                        error = %err,
                        "passthrough sink closed"
                    );
                    sink = None;
                }
                if events
                    .send(CaptureEvent::Chunk(stream, chunk.to_vec()))
                    .is_err()
                {
                    return;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = events.send(CaptureEvent::Failed(stream, err));
                return;
            }
        }
    }
}
