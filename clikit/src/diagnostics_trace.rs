use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::process::{ExecutionOutcome, TerminationReason};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionTrace {
    pub schema_version: u32,
    pub clikit_version: String,
    pub command: String,
    pub working_directory: String,
    pub timeout_ms: u64,
    pub started_at_unix_ms: Option<u128>,
    pub elapsed_ms: u128,
    pub success: bool,
    pub reason: Option<TerminationReason>,
    pub code: Option<i32>,
    pub stdout_bytes: usize,
    pub stderr_bytes: usize,
}

impl ExecutionTrace {
    pub fn new(
        command: &str,
        working_directory: &Path,
        timeout_ms: u64,
        started_at: SystemTime,
        elapsed: Duration,
        outcome: &ExecutionOutcome,
    ) -> Self {
        let started_at_unix_ms = started_at
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|since_epoch| since_epoch.as_millis());
        let (success, reason, code, stdout_bytes, stderr_bytes) = match outcome {
            Ok(output) => (true, None, Some(0), output.len(), 0),
            Err(err) => (
                false,
                Some(err.reason()),
                Some(err.code()),
                err.stdout_bytes().len(),
                err.stderr_bytes().len(),
            ),
        };
        Self {
            schema_version: 1,
            clikit_version: crate::clikit_version().to_string(),
            command: command.to_string(),
            working_directory: working_directory.to_string_lossy().to_string(),
            timeout_ms,
            started_at_unix_ms,
            elapsed_ms: elapsed.as_millis(),
            success,
            reason,
            code,
            stdout_bytes,
            stderr_bytes,
        }
    }
}

pub fn diagnostics_dir() -> Option<PathBuf> {
    std::env::var("CLIKIT_DIAGNOSTICS_DIR")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

pub fn write_execution_trace(dir: &Path, trace: &ExecutionTrace) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let trace_path = dir.join("execution_trace.json");
    let body = serde_json::to_string_pretty(trace).map_err(std::io::Error::other)?;
    std::fs::write(&trace_path, body)?;
    Ok(trace_path)
}

/// Best-effort: a trace that cannot be written is logged and otherwise ignored.
pub fn maybe_write_execution_trace(trace: &ExecutionTrace) {
    let Some(dir) = diagnostics_dir() else {
        return;
    };
    if let Err(err) = write_execution_trace(&dir, trace) {
        tracing::warn!(dir = %dir.display(), error = %err, "failed to write execution trace");
    }
}
