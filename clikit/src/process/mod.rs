//! Subprocess execution: spawn one child, drain both pipes concurrently, and
//! classify the ending under a bounded completion barrier.

mod barrier;
mod capture;
mod request;
mod runner;
mod termination;

pub use capture::{CapturedOutput, OutputStream};
pub use request::{CommandMode, DEFAULT_SHELL, DEFAULT_TIMEOUT, ExecutionRequest, Passthrough, Sink};
pub use runner::{ExecutionOutcome, RunState, execute};
pub use termination::{NO_STATUS_CODE, TerminationError, TerminationReason};

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod capture_test;
#[cfg(test)]
mod runner_test;
