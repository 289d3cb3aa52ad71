use std::time::{Duration, Instant};

use super::test_support::SharedBuffer;
use super::{
    ExecutionRequest, NO_STATUS_CODE, Passthrough, RunState, TerminationReason, execute,
};

fn sh(script: &str) -> ExecutionRequest {
    ExecutionRequest::new(".", "sh").args(["-c", script])
}

#[test]
fn run_state_only_moves_forward() {
    assert!(RunState::NotStarted.can_advance_to(RunState::Spawned));
    assert!(RunState::NotStarted.can_advance_to(RunState::SpawnFailed));
    assert!(RunState::Spawned.can_advance_to(RunState::Running));
    assert!(RunState::Running.can_advance_to(RunState::Exited));
    assert!(RunState::Running.can_advance_to(RunState::TimedOut));
    assert!(RunState::Exited.can_advance_to(RunState::Draining));
    assert!(RunState::Draining.can_advance_to(RunState::Completed));
    assert!(RunState::Draining.can_advance_to(RunState::TimedOut));

    assert!(!RunState::Completed.can_advance_to(RunState::Draining));
    assert!(!RunState::TimedOut.can_advance_to(RunState::Completed));
    assert!(!RunState::SpawnFailed.can_advance_to(RunState::Spawned));
    assert!(!RunState::Spawned.can_advance_to(RunState::Spawned));
    assert!(!RunState::Running.can_advance_to(RunState::Completed));

    assert!(RunState::SpawnFailed.is_terminal());
    assert!(RunState::Completed.is_terminal());
    assert!(RunState::TimedOut.is_terminal());
    assert!(!RunState::Draining.is_terminal());
}

#[cfg(unix)]
#[test]
fn printf_hello_succeeds_with_exact_stdout() {
    let outcome = execute(ExecutionRequest::new(".", "printf").arg("hello\n"));
    assert_eq!(outcome.unwrap(), "hello\n");
}

#[cfg(unix)]
#[test]
fn many_small_writes_are_captured_as_one_string() {
    let outcome = execute(sh("for i in 1 2 3 4 5; do printf \"$i,\"; sleep 0.01; done"));
    assert_eq!(outcome.unwrap(), "1,2,3,4,5,");
}

#[cfg(unix)]
#[test]
fn exit_seven_without_output_reports_code_and_empty_buffers() {
    let err = execute(sh("exit 7")).unwrap_err();
    assert_eq!(err.reason(), TerminationReason::Exit);
    assert_eq!(err.code(), 7);
    assert!(err.stdout_bytes().is_empty());
    assert!(err.stderr_bytes().is_empty());
}

#[cfg(unix)]
#[test]
fn non_zero_exit_keeps_both_streams() {
    let err = execute(sh("echo out; echo err 1>&2; exit 1")).unwrap_err();
    assert_eq!(err.reason(), TerminationReason::Exit);
    assert_eq!(err.code(), 1);
    assert_eq!(err.stdout_bytes(), b"out\n");
    assert_eq!(err.stderr_bytes(), b"err\n");
    assert_eq!(err.output(), "out\n");
    assert_eq!(err.message(), "err");
}

#[cfg(unix)]
#[test]
fn sleeping_child_times_out_near_the_deadline() {
    let started = Instant::now();
    let err = execute(
        ExecutionRequest::new(".", "sleep")
            .arg("5")
            .timeout(Duration::from_millis(100)),
    )
    .unwrap_err();
    let elapsed = started.elapsed();
    assert_eq!(err.reason(), TerminationReason::TimedOut);
    assert!(err.is_timeout());
    assert_eq!(err.code(), NO_STATUS_CODE);
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[cfg(unix)]
#[test]
fn timeout_keeps_partial_output() {
    let err = execute(
        sh("printf 'before\\n'; sleep 5; printf 'after\\n'").timeout(Duration::from_millis(300)),
    )
    .unwrap_err();
    assert_eq!(err.reason(), TerminationReason::TimedOut);
    assert_eq!(err.output(), "before\n");
}

#[cfg(unix)]
#[test]
fn killed_child_reports_signal() {
    let err = execute(sh("printf 'dying'; kill -9 $$")).unwrap_err();
    assert_eq!(err.reason(), TerminationReason::Signal);
    assert_eq!(err.code(), 9);
    assert_eq!(err.output(), "dying");
}

#[test]
fn missing_executable_is_a_spawn_failure_with_no_buffers() {
    let err =
        execute(ExecutionRequest::new(".", "clikit-definitely-not-installed-xyz")).unwrap_err();
    assert_eq!(err.reason(), TerminationReason::SpawnFailed);
    assert_eq!(err.code(), NO_STATUS_CODE);
    assert!(err.stdout_bytes().is_empty());
    assert!(err.stderr_bytes().is_empty());
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn missing_working_directory_is_a_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = execute(ExecutionRequest::new(&missing, "pwd")).unwrap_err();
    assert_eq!(err.reason(), TerminationReason::SpawnFailed);
    assert_eq!(err.working_directory(), missing.as_path());
}

#[cfg(unix)]
#[test]
fn child_runs_in_the_resolved_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dunce::canonicalize(dir.path()).unwrap();
    let output = execute(ExecutionRequest::new(dir.path(), "pwd").arg("-P")).unwrap();
    assert_eq!(output.trim_end(), expected.to_string_lossy());
}

#[cfg(unix)]
#[test]
fn invalid_utf8_is_decoded_lossily() {
    let output = execute(ExecutionRequest::new(".", "printf").arg("ok\\377\\n")).unwrap();
    assert_eq!(output, "ok\u{fffd}\n");
}

#[cfg(unix)]
#[test]
fn passthrough_sinks_mirror_each_stream() {
    let out = SharedBuffer::default();
    let err = SharedBuffer::default();
    let outcome = execute(
        sh("printf 'to-out'; printf 'to-err' 1>&2")
            .passthrough(Passthrough::new(out.clone(), err.clone())),
    );
    assert_eq!(outcome.unwrap(), "to-out");
    similar_asserts::assert_eq!(out.contents(), b"to-out".to_vec());
    similar_asserts::assert_eq!(err.contents(), b"to-err".to_vec());
}

#[cfg(unix)]
#[test]
fn echo_does_not_change_the_outcome() {
    let quiet = execute(sh("echo same")).unwrap();
    let echoed = execute(sh("echo same").echo_command(true)).unwrap();
    assert_eq!(quiet, echoed);
}

#[cfg(unix)]
#[test]
fn termination_error_renders_the_description_block() {
    let err = execute(sh("echo out; echo '  err  ' 1>&2; exit 3")).unwrap_err();
    let rendered = err.to_string();
    let lines = rendered.lines().collect::<Vec<_>>();
    assert_eq!(lines.first().copied(), Some("TerminationError:BEGIN"));
    assert_eq!(lines.last().copied(), Some("TerminationError:END"));
    assert!(
        rendered.contains("Command: sh -c 'echo out; echo '\\''  err  '\\'' 1>&2; exit 3'"),
        "{rendered}"
    );
    assert!(rendered.contains("Reason: exit\n"), "{rendered}");
    assert!(rendered.contains("Status: 3\n"), "{rendered}");
    assert!(rendered.contains("Output: \"out\n\"\n"), "{rendered}");
    assert!(rendered.contains("Message: \"err\"\n"), "{rendered}");
}
