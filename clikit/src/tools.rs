//! Thin wrappers around common command line tools.
//!
//! Each wrapper builds an `ExecutionRequest` from the `Shell` defaults, runs it,
//! and applies whatever small amount of domain logic the tool needs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ClikitConfig;
use crate::process::{
    self, CommandMode, DEFAULT_SHELL, DEFAULT_TIMEOUT, ExecutionOutcome, ExecutionRequest,
    Passthrough,
};

/// Invocation defaults shared by every wrapper.
#[derive(Debug, Clone)]
pub struct Shell {
    working_directory: PathBuf,
    passthrough: bool,
    echo_commands: bool,
    timeout: Duration,
    shell: String,
}

impl Shell {
    /// Capture-only shell rooted at `working_directory`.
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            passthrough: false,
            echo_commands: false,
            timeout: DEFAULT_TIMEOUT,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    pub fn from_config(working_directory: impl Into<PathBuf>, config: &ClikitConfig) -> Self {
        Self::new(working_directory)
            .with_passthrough(config.passthrough())
            .with_echo_commands(config.echo_commands())
            .with_timeout(config.timeout())
            .with_shell(config.shell())
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn with_echo_commands(mut self, echo: bool) -> Self {
        self.echo_commands = echo;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn request<I, S>(&self, program: &str, args: I) -> ExecutionRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExecutionRequest::new(&self.working_directory, program)
            .args(args)
            .maybe_passthrough(self.passthrough.then(Passthrough::inherit))
            .echo_command(self.echo_commands)
            .timeout(self.timeout)
    }

    pub fn run<I, S>(&self, program: &str, args: I) -> ExecutionOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        process::execute(self.request(program, args))
    }

    /// Run `script` through the configured shell.
    pub fn run_script(&self, script: &str) -> ExecutionOutcome {
        let request = self
            .request(script, std::iter::empty::<String>())
            .mode(CommandMode::Shell {
                shell: self.shell.clone(),
            });
        process::execute(request)
    }

    /// Disk usage of `path` via `du`, with the queried path stripped from the report.
    pub fn size_of(&self, path: &str, detailed: bool) -> ExecutionOutcome {
        let options = if detailed { "-akc" } else { "-sk" };
        self.run("du", [options, path])
            .map(|output| output.replace(path, ""))
    }

    pub fn print_working_directory(&self) -> ExecutionOutcome {
        self.run("pwd", std::iter::empty::<String>())
            .map(|output| output.trim().to_string())
    }

    pub fn username(&self) -> ExecutionOutcome {
        self.run("id", ["-un"])
            .map(|output| output.trim_end_matches(['\n', '\r']).to_string())
    }

    pub fn create_folder(&self, path: &str) -> ExecutionOutcome {
        self.run("mkdir", ["-p", path])
    }

    pub fn remove(&self, path: &str) -> ExecutionOutcome {
        self.run("rm", ["-rf", path])
    }

    pub fn create_file(&self, path: &str) -> ExecutionOutcome {
        self.run("touch", [path])
    }

    pub fn copy(&self, from: &str, to: &str) -> ExecutionOutcome {
        self.run("cp", [from, to])
    }

    pub fn rsync(&self, from: &str, to: &str) -> ExecutionOutcome {
        self.run("rsync", ["-a", from, to])
    }

    pub fn concatenate(&self, paths: &[&str]) -> ExecutionOutcome {
        self.run("cat", paths.iter().copied())
    }

    /// Echo each non-empty line separately and join the outputs; the first failure wins.
    pub fn echo(&self, text: &str) -> ExecutionOutcome {
        text.split('\n')
            .filter(|line| !line.is_empty())
            .try_fold(String::new(), |mut acc, line| -> ExecutionOutcome {
                acc.push_str(&self.run("echo", [line])?);
                Ok(acc)
            })
    }
}
