use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::capture::CapturedOutput;

/// Code recorded when the child never produced an exit status.
pub const NO_STATUS_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The child exited on its own with a non-zero status.
    Exit,
    /// The child was terminated by a signal.
    Signal,
    /// The completion barrier missed its deadline.
    TimedOut,
    /// The child could not be started.
    SpawnFailed,
    /// Reading one of the pipes failed before end-of-file.
    CaptureFailed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationReason::Exit => "exit",
            TerminationReason::Signal => "uncaught signal",
            TerminationReason::TimedOut => "timed out",
            TerminationReason::SpawnFailed => "spawn failed",
            TerminationReason::CaptureFailed => "capture failed",
        })
    }
}

/// Why and how a child process did not yield a clean success.
#[derive(Debug)]
pub struct TerminationError {
    reason: TerminationReason,
    code: i32,
    command: String,
    working_directory: PathBuf,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    source: Option<std::io::Error>,
}

impl TerminationError {
    pub(crate) fn spawn_failed(
        command: String,
        working_directory: PathBuf,
        source: std::io::Error,
    ) -> Self {
        Self {
            reason: TerminationReason::SpawnFailed,
            code: NO_STATUS_CODE,
            command,
            working_directory,
            stdout: vec![],
            stderr: vec![],
            source: Some(source),
        }
    }

    pub(crate) fn from_captures(
        reason: TerminationReason,
        code: i32,
        command: String,
        working_directory: PathBuf,
        captures: (CapturedOutput, CapturedOutput),
        source: Option<std::io::Error>,
    ) -> Self {
        let (stdout, stderr) = captures;
        Self {
            reason,
            code,
            command,
            working_directory,
            stdout: stdout.into_bytes(),
            stderr: stderr.into_bytes(),
            source,
        }
    }

    pub fn reason(&self) -> TerminationReason {
        self.reason
    }

    /// Exit status for `Exit`, signal number for `Signal`, `-1` when unknown.
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn stdout_bytes(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr_bytes(&self) -> &[u8] {
        &self.stderr
    }

    /// Captured stdout, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Captured stderr, lossily decoded and trimmed.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    pub fn is_timeout(&self) -> bool {
        self.reason == TerminationReason::TimedOut
    }
}

impl fmt::Display for TerminationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TerminationError:BEGIN")?;
        writeln!(f, "Command: {}", self.command)?;
        writeln!(f, "Working directory: {}", self.working_directory.display())?;
        match &self.source {
            Some(source) => writeln!(f, "Reason: {} ({source})", self.reason)?,
            None => writeln!(f, "Reason: {}", self.reason)?,
        }
        writeln!(f, "Status: {}", self.code)?;
        writeln!(f, "Output: \"{}\"", self.output())?;
        writeln!(f, "Message: \"{}\"", self.message())?;
        write!(f, "TerminationError:END")
    }
}

impl std::error::Error for TerminationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
