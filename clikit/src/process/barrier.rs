use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use super::capture::{CaptureEvent, CapturedOutput, OutputStream};

fn poll_interval() -> Duration {
    Duration::from_millis(10)
}

#[derive(Debug)]
pub(crate) enum BarrierOutcome {
    /// Child reaped and both streams reached end-of-file (or failed).
    Completed(ExitStatus),
    /// Deadline elapsed first; carries the exit status if the child had already been reaped.
    TimedOut(Option<ExitStatus>),
    /// Waiting on the child itself failed.
    WaitFailed(std::io::Error),
}

/// Joins child exit with both capture routines under one deadline.
///
/// Owns both `CapturedOutput` buffers; each is appended to only from its own stream's events.
pub(crate) struct CompletionBarrier {
    events: mpsc::Receiver<CaptureEvent>,
    stdout: CapturedOutput,
    stderr: CapturedOutput,
    stdout_done: bool,
    stderr_done: bool,
    status: Option<ExitStatus>,
    capture_error: Option<std::io::Error>,
}

impl CompletionBarrier {
    pub(crate) fn new(events: mpsc::Receiver<CaptureEvent>) -> Self {
        Self {
            events,
            stdout: CapturedOutput::new(OutputStream::Stdout),
            stderr: CapturedOutput::new(OutputStream::Stderr),
            stdout_done: false,
            stderr_done: false,
            status: None,
            capture_error: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.status.is_some() && self.stdout_done && self.stderr_done
    }

    fn apply(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Chunk(OutputStream::Stdout, chunk) => self.stdout.append(&chunk),
            CaptureEvent::Chunk(OutputStream::Stderr, chunk) => self.stderr.append(&chunk),
            CaptureEvent::Eof(stream) => self.mark_done(stream),
            CaptureEvent::Failed(stream, err) => {
                tracing::warn!(stream = stream.as_str(), error = %err, "capture read failed");
                self.mark_done(stream);
                self.capture_error.get_or_insert(err);
            }
        }
    }

    fn mark_done(&mut self, stream: OutputStream) {
        match stream {
            OutputStream::Stdout => self.stdout_done = true,
            OutputStream::Stderr => self.stderr_done = true,
        }
    }

    fn drain_pending(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    // Every capture routine has exited; nothing else can arrive.
                    self.stdout_done = true;
                    self.stderr_done = true;
                    return;
                }
            }
        }
    }

    pub(crate) fn wait(&mut self, child: &mut Child, deadline: Instant) -> BarrierOutcome {
        loop {
            self.drain_pending();
            if let (true, Some(status)) = (self.is_complete(), self.status) {
                return BarrierOutcome::Completed(status);
            }
            let now = Instant::now();
            if now >= deadline {
                return BarrierOutcome::TimedOut(self.status);
            }
            let slice = (deadline - now).min(poll_interval());
            if self.status.is_none() {
                match child.wait_timeout(slice) {
                    Ok(status) => self.status = status,
                    Err(err) => return BarrierOutcome::WaitFailed(err),
                }
                continue;
            }
            match self.events.recv_timeout(slice) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.stdout_done = true;
                    self.stderr_done = true;
                }
            }
        }
    }

    pub(crate) fn take_capture_error(&mut self) -> Option<std::io::Error> {
        self.capture_error.take()
    }

    /// Hands over whatever was captured, dropping the receiving end so capture routines stop.
    pub(crate) fn into_captures(mut self) -> (CapturedOutput, CapturedOutput) {
        self.drain_pending();
        (self.stdout, self.stderr)
    }
}
