//! Process execution abstraction (real subprocesses vs. scripted runners in tests).

use camino::Utf8PathBuf;
use std::fmt;
use std::process::Stdio;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name of the program, for messages.
    pub fn program_name(&self) -> &str {
        self.program.file_name().unwrap_or(self.program.as_str())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(joined) => f.write_str(&joined),
            Err(_) => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// How the user relates to a running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Someone is waiting on the result (diagram conversion).
    Foreground,
    /// Build-like work whose output is only inspected on failure.
    Background,
    /// Inherits the terminal (debugger).
    Interactive,
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Text to show the user when the process failed: the error stream, or
    /// standard output if the tool wrote its errors there.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {status}")]
    Failed {
        program: String,
        status: i32,
        output: String,
    },
}

/// Runs external commands to completion without blocking the caller's thread.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    /// Run `command` and collect its output. Only failing to start the
    /// process is an error; a non-zero exit is reported in the output.
    async fn run(&self, command: &CommandLine, mode: RunMode) -> Result<ProcessOutput, ProcessError>;
}

/// Spawns real subprocesses through tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioRunner;

impl ProcessRunner for TokioRunner {
    async fn run(&self, command: &CommandLine, mode: RunMode) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!(%command, ?mode, "spawning");
        let mut cmd = tokio::process::Command::new(command.program.as_std_path());
        cmd.args(&command.args);
        let launch_error = |source| ProcessError::Launch {
            program: command.program.to_string(),
            source,
        };

        if mode == RunMode::Interactive {
            let status = cmd.status().await.map_err(launch_error)?;
            return Ok(ProcessOutput {
                status: status.code().unwrap_or(-1),
                ..Default::default()
            });
        }

        let output = cmd.stdin(Stdio::null()).output().await.map_err(launch_error)?;
        let result = ProcessOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program = command.program_name(), status = result.status, "process exited");
        Ok(result)
    }
}
