use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::args::{Cli, Commands, DuArgs, ExecArgs};
use crate::config::{ClikitConfig, find_repo_root, load_clikit_config};
use crate::diagnostics_trace::{ExecutionTrace, maybe_write_execution_trace};
use crate::process::{
    self, CommandMode, ExecutionOutcome, ExecutionRequest, Passthrough, TerminationError,
    TerminationReason,
};
use crate::tools::Shell;

pub const EXIT_USAGE: i32 = 2;
pub const EXIT_TIMED_OUT: i32 = 124;
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Process exit code that best reflects how the child ended.
pub fn exit_code_for(err: &TerminationError) -> i32 {
    match err.reason() {
        TerminationReason::Exit => err.code(),
        TerminationReason::Signal => 128 + err.code(),
        TerminationReason::TimedOut => EXIT_TIMED_OUT,
        TerminationReason::SpawnFailed => EXIT_SPAWN_FAILED,
        TerminationReason::CaptureFailed => 1,
    }
}

fn resolve_cwd(cli: &Cli) -> PathBuf {
    cli.cwd
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn run_cli(cli: &Cli) -> i32 {
    let cwd = resolve_cwd(cli);
    let repo_root = find_repo_root(&cwd);
    let config = match load_clikit_config(&repo_root) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("clikit: {err}");
            return EXIT_USAGE;
        }
    };
    tracing::debug!(
        cwd = %cwd.display(),
        repo_root = %repo_root.display(),
        ?config,
        "loaded config"
    );

    match &cli.command {
        Commands::Exec(args) => run_exec(&cwd, &config, args),
        Commands::Pwd => print_outcome(capture_shell(&cwd, &config).print_working_directory()),
        Commands::Whoami => print_outcome(capture_shell(&cwd, &config).username()),
        Commands::Du(DuArgs { detailed, path }) => {
            print_outcome(capture_shell(&cwd, &config).size_of(path, *detailed))
        }
    }
}

fn capture_shell(cwd: &Path, config: &ClikitConfig) -> Shell {
    Shell::from_config(cwd, config).with_passthrough(false)
}

fn print_outcome(outcome: ExecutionOutcome) -> i32 {
    match outcome {
        Ok(output) => {
            println!("{}", output.trim_end());
            0
        }
        Err(err) => {
            eprintln!("{err}");
            exit_code_for(&err)
        }
    }
}

pub fn build_exec_request(
    cwd: &Path,
    config: &ClikitConfig,
    args: &ExecArgs,
) -> Option<ExecutionRequest> {
    let (program, rest) = args.command.split_first()?;
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.timeout());
    let passthrough = !args.quiet && config.passthrough();
    let request = ExecutionRequest::new(cwd, program.as_str())
        .args(rest.iter().cloned())
        .maybe_passthrough(passthrough.then(Passthrough::inherit))
        .echo_command(args.echo || config.echo_commands())
        .timeout(timeout);
    if args.shell {
        return Some(request.mode(CommandMode::Shell {
            shell: config.shell().to_string(),
        }));
    }
    Some(request)
}

fn run_exec(cwd: &Path, config: &ClikitConfig, args: &ExecArgs) -> i32 {
    let Some(request) = build_exec_request(cwd, config, args) else {
        eprintln!("clikit: exec requires a program");
        return EXIT_USAGE;
    };
    let echoed = request.echoes_command();
    let mirrored = request.has_passthrough();
    let command_line = request.display_command();
    let timeout_ms = request.timeout_ms();

    let started_at = SystemTime::now();
    let started = Instant::now();
    let outcome = process::execute(request);
    maybe_write_execution_trace(&ExecutionTrace::new(
        &command_line,
        cwd,
        timeout_ms,
        started_at,
        started.elapsed(),
        &outcome,
    ));

    match outcome {
        Ok(output) => {
            if !mirrored {
                print!("{output}");
            }
            0
        }
        Err(err) => {
            if !echoed {
                eprintln!("{err}");
            }
            exit_code_for(&err)
        }
    }
}
