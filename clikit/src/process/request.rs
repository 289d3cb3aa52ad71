use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::command_line::render_command_line;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Live destination for one captured stream.
pub type Sink = Box<dyn Write + Send>;

/// A pair of sinks that mirror the child's stdout and stderr as chunks arrive.
pub struct Passthrough {
    stdout: Sink,
    stderr: Sink,
}

impl Passthrough {
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Mirror into the current process's own stdout and stderr.
    pub fn inherit() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }

    pub(crate) fn into_sinks(self) -> (Sink, Sink) {
        (self.stdout, self.stderr)
    }
}

impl fmt::Debug for Passthrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passthrough").finish_non_exhaustive()
    }
}

/// How the executable and arguments reach the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandMode {
    /// Spawn the executable with the argument vector as-is.
    Direct,
    /// Join executable and arguments with spaces and hand the line to `<shell> -c`.
    ///
    /// Opt-in for callers that need globbing, pipes or redirects.
    Shell { shell: String },
}

/// Immutable description of one child process invocation.
#[derive(Debug)]
pub struct ExecutionRequest {
    working_directory: PathBuf,
    executable: String,
    arguments: Vec<String>,
    mode: CommandMode,
    passthrough: Option<Passthrough>,
    echo_command: bool,
    timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(working_directory: impl Into<PathBuf>, executable: impl Into<String>) -> Self {
        Self {
            working_directory: working_directory.into(),
            executable: executable.into(),
            arguments: vec![],
            mode: CommandMode::Direct,
            passthrough: None,
            echo_command: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A request that runs `script` through `shell -c`.
    pub fn shell_script(
        working_directory: impl Into<PathBuf>,
        shell: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self::new(working_directory, script).mode(CommandMode::Shell {
            shell: shell.into(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn mode(mut self, mode: CommandMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn passthrough(mut self, passthrough: Passthrough) -> Self {
        self.passthrough = Some(passthrough);
        self
    }

    pub fn maybe_passthrough(mut self, passthrough: Option<Passthrough>) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn echo_command(mut self, echo: bool) -> Self {
        self.echo_command = echo;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn command_mode(&self) -> &CommandMode {
        &self.mode
    }

    pub fn has_passthrough(&self) -> bool {
        self.passthrough.is_some()
    }

    pub fn echoes_command(&self) -> bool {
        self.echo_command
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// The deadline in whole milliseconds, saturating at `u64::MAX`.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// The program handed to the OS and its argument vector.
    pub fn argv(&self) -> (String, Vec<String>) {
        match &self.mode {
            CommandMode::Direct => (self.executable.clone(), self.arguments.clone()),
            CommandMode::Shell { shell } => {
                let script = std::iter::once(self.executable.as_str())
                    .chain(self.arguments.iter().map(String::as_str))
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                (shell.clone(), vec!["-c".to_string(), script])
            }
        }
    }

    /// Human-readable rendering of exactly what gets spawned.
    pub fn display_command(&self) -> String {
        let (program, args) = self.argv();
        render_command_line(&program, &args)
    }

    pub(crate) fn take_passthrough(&mut self) -> Option<Passthrough> {
        self.passthrough.take()
    }
}
