use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "clikit")]
#[command(about = "A collection of command line tools for developers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// More clikit diagnostics (debug-level logging).
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Run from this directory instead of the current one.
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a program, mirroring its output live and reporting how it ended.
    ///
    /// Example:
    ///   clikit exec --timeout-ms 5000 -- git status --short
    Exec(ExecArgs),

    /// Print the working directory as reported by `pwd`.
    Pwd,

    /// Print the current user name as reported by `id -un`.
    Whoami,

    /// Report disk usage of a path via `du`.
    Du(DuArgs),
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Override the completion deadline (default from config, else 10s).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Log the command before running it and its output afterwards.
    #[arg(long)]
    pub echo: bool,

    /// Capture only; print stdout once the program succeeds.
    #[arg(long)]
    pub quiet: bool,

    /// Hand the joined command line to the configured shell (`sh -c`).
    #[arg(long)]
    pub shell: bool,

    /// Program followed by its arguments.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DuArgs {
    /// List every file (`du -akc`) instead of a single summary (`du -sk`).
    #[arg(long)]
    pub detailed: bool,

    pub path: String,
}
