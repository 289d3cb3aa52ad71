use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use super::barrier::{BarrierOutcome, CompletionBarrier};
use super::capture::{
    CaptureEvent, DrainHandle, DrainSource, OutputStream, PlatformDrain, PollableReader,
    StreamDrain,
};
use super::request::{ExecutionRequest, Sink};
use super::termination::{NO_STATUS_CODE, TerminationError, TerminationReason};
use crate::format::echo;

pub type ExecutionOutcome = Result<String, TerminationError>;

/// Lifecycle of a single invocation. Each request walks it once, forward only.
///
/// The barrier observes exit and end-of-file concurrently; the runner records
/// `Exited` and `Draining` once the barrier reports the child was reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Spawned,
    SpawnFailed,
    Running,
    Exited,
    Draining,
    Completed,
    TimedOut,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (NotStarted, Spawned)
                | (NotStarted, SpawnFailed)
                | (Spawned, Running)
                | (Running, Exited)
                | (Running, TimedOut)
                | (Exited, Draining)
                | (Draining, Completed)
                | (Draining, TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::SpawnFailed | RunState::Completed | RunState::TimedOut
        )
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(self.can_advance_to(next), "{self:?} -> {next:?}");
        tracing::trace!(from = ?*self, to = ?next, "process state");
        *self = next;
    }

    /// Record a reaped child, then the end of draining.
    fn finish_after_exit(&mut self, terminal: RunState) {
        self.advance(RunState::Exited);
        self.advance(RunState::Draining);
        self.advance(terminal);
    }
}

/// Run one child process to completion and classify the result.
///
/// Exit status 0 with both streams drained yields the stdout text. Every other
/// ending, including spawn failure and a missed deadline, is a `TerminationError`
/// holding whatever was captured.
pub fn execute(request: ExecutionRequest) -> ExecutionOutcome {
    let echo_command = request.echoes_command();
    if echo_command {
        echo::log_input(request.working_directory(), &request.display_command());
    }
    let outcome = run(request);
    if echo_command {
        match &outcome {
            Ok(output) => echo::log_output(output),
            Err(err) => echo::log_failure(err),
        }
    }
    outcome
}

fn resolve_working_directory(path: &Path) -> std::io::Result<PathBuf> {
    let resolved = dunce::canonicalize(path)?;
    if !resolved.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("not a directory: {}", resolved.display()),
        ));
    }
    Ok(resolved)
}

fn resolve_program(program: &str, working_directory: &Path) -> std::io::Result<PathBuf> {
    let search_path: Option<OsString> = std::env::var_os("PATH");
    which::which_in(program, search_path, working_directory).map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{program}: {err}"),
        )
    })
}

fn start_capture<R>(
    stream: OutputStream,
    reader: R,
    sink: Option<Sink>,
    events: &mpsc::Sender<CaptureEvent>,
    cancel: &Arc<AtomicBool>,
) -> std::io::Result<DrainHandle>
where
    R: PollableReader + Send + 'static,
{
    PlatformDrain::start(DrainSource {
        stream,
        reader,
        sink,
        events: events.clone(),
        cancel: Arc::clone(cancel),
    })
}

fn run(mut request: ExecutionRequest) -> ExecutionOutcome {
    let mut state = RunState::NotStarted;
    let command_line = request.display_command();
    let spawn_failed = |state: &mut RunState, directory: PathBuf, err: std::io::Error| {
        state.advance(RunState::SpawnFailed);
        TerminationError::spawn_failed(command_line.clone(), directory, err)
    };

    let working_directory = match resolve_working_directory(request.working_directory()) {
        Ok(dir) => dir,
        Err(err) => {
            let requested = request.working_directory().to_path_buf();
            return Err(spawn_failed(&mut state, requested, err));
        }
    };
    let (program, args) = request.argv();
    let program_path = match resolve_program(&program, &working_directory) {
        Ok(path) => path,
        Err(err) => return Err(spawn_failed(&mut state, working_directory, err)),
    };

    // Explicit pipes so the parent never retains a write end once `command` is dropped;
    // a retained write end would keep the readers from ever seeing EOF.
    let pipes = os_pipe::pipe().and_then(|stdout| os_pipe::pipe().map(|stderr| (stdout, stderr)));
    let ((stdout_reader, stdout_writer), (stderr_reader, stderr_writer)) = match pipes {
        Ok(pipes) => pipes,
        Err(err) => return Err(spawn_failed(&mut state, working_directory, err)),
    };
    let mut command = Command::new(&program_path);
    command
        .args(&args)
        .current_dir(&working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_writer))
        .stderr(Stdio::from(stderr_writer));
    let spawned = command.spawn();
    drop(command);
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => return Err(spawn_failed(&mut state, working_directory, err)),
    };
    state.advance(RunState::Spawned);
    let deadline = Instant::now() + request.timeout_duration();
    tracing::debug!(command = %command_line, pid = child.id(), "spawned");

    let (stdout_sink, stderr_sink) = match request.take_passthrough() {
        Some(passthrough) => {
            let (out, err) = passthrough.into_sinks();
            (Some(out), Some(err))
        }
        None => (None, None),
    };
    state.advance(RunState::Running);
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<CaptureEvent>();
    let mut drains = Vec::with_capacity(2);
    let started = start_capture(OutputStream::Stdout, stdout_reader, stdout_sink, &tx, &cancel)
        .and_then(|stdout_drain| {
            drains.push(stdout_drain);
            start_capture(OutputStream::Stderr, stderr_reader, stderr_sink, &tx, &cancel)
        })
        .map(|stderr_drain| drains.push(stderr_drain));
    drop(tx);
    if let Err(err) = started {
        let _ = child.kill();
        let _ = child.wait();
        stop_captures(&cancel, drains);
        state.finish_after_exit(RunState::Completed);
        return Err(TerminationError::from_captures(
            TerminationReason::CaptureFailed,
            NO_STATUS_CODE,
            command_line,
            working_directory,
            CompletionBarrier::new(rx).into_captures(),
            Some(err),
        ));
    }

    let mut barrier = CompletionBarrier::new(rx);
    let barrier_outcome = barrier.wait(&mut child, deadline);
    let (reason, code, source) = match barrier_outcome {
        BarrierOutcome::Completed(status) => {
            stop_captures(&cancel, drains);
            state.finish_after_exit(RunState::Completed);
            match (status.success(), barrier.take_capture_error()) {
                (true, None) => {
                    let (stdout, _stderr) = barrier.into_captures();
                    return Ok(stdout.to_string_lossy());
                }
                (_, Some(err)) => (
                    TerminationReason::CaptureFailed,
                    status_code(status),
                    Some(err),
                ),
                (false, None) => (status_reason(status), status_code(status), None),
            }
        }
        BarrierOutcome::TimedOut(status) => {
            if status.is_none() {
                let _ = child.kill();
                let _ = child.wait();
            }
            stop_captures(&cancel, drains);
            match status {
                Some(_) => state.finish_after_exit(RunState::TimedOut),
                None => state.advance(RunState::TimedOut),
            }
            tracing::debug!(
                command = %command_line,
                timeout_ms = request.timeout_ms(),
                "timed out"
            );
            let code = status.map(status_code).unwrap_or(NO_STATUS_CODE);
            (TerminationReason::TimedOut, code, None)
        }
        BarrierOutcome::WaitFailed(err) => {
            let _ = child.kill();
            stop_captures(&cancel, drains);
            state.finish_after_exit(RunState::Completed);
            (TerminationReason::CaptureFailed, NO_STATUS_CODE, Some(err))
        }
    };
    debug_assert!(state.is_terminal());
    Err(TerminationError::from_captures(
        reason,
        code,
        command_line,
        working_directory,
        barrier.into_captures(),
        source,
    ))
}

/// Signal every capture routine and wait for it, so none touches a sink after `execute` returns.
fn stop_captures(cancel: &AtomicBool, drains: Vec<DrainHandle>) {
    cancel.store(true, Ordering::Release);
    drains.into_iter().for_each(DrainHandle::finish);
}

fn status_reason(status: ExitStatus) -> TerminationReason {
    match status.code() {
        Some(_) => TerminationReason::Exit,
        None => TerminationReason::Signal,
    }
}

#[cfg(unix)]
fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal())
        .unwrap_or(NO_STATUS_CODE)
}

#[cfg(not(unix))]
fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(NO_STATUS_CODE)
}
