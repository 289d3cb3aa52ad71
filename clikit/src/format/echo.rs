//! Observational logging for requests that ask to echo their command.
//!
//! Nothing here touches the captured buffers.

use std::path::Path;

use super::ansi;
use crate::process::TerminationError;

pub const LOG_TARGET: &str = "clikit::shell";

pub fn render_input_banner(working_directory: &Path, command_line: &str) -> String {
    [
        ansi::green("TERMINAL INPUT BEGIN"),
        format!("Path: {}", working_directory.display()),
        format!("Command: {command_line}"),
        ansi::green("TERMINAL INPUT END"),
    ]
    .join("\n")
}

pub fn render_output_banner(output: &str) -> String {
    let body = output.strip_suffix('\n').unwrap_or(output);
    [
        ansi::yellow("TERMINAL OUTPUT BEGIN"),
        body.to_string(),
        ansi::yellow("TERMINAL OUTPUT END"),
    ]
    .join("\n")
}

pub fn log_input(working_directory: &Path, command_line: &str) {
    let banner = render_input_banner(working_directory, command_line);
    tracing::info!(target: LOG_TARGET, "\n{banner}");
}

pub fn log_output(output: &str) {
    tracing::info!(target: LOG_TARGET, "\n{}", render_output_banner(output));
}

pub fn log_failure(err: &TerminationError) {
    tracing::error!(target: LOG_TARGET, "\n{}", ansi::red(&err.to_string()));
}
