/// External process execution
///
/// Every operation in this tool is an external `vagrant`/`docker` call.
/// `Shell` is the seam between the orchestration code and the OS so the
/// sequences can be exercised without a VM.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::core::output::OutputSink;
use crate::utils::shell_quote;

/// A program with its arguments, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Exit status of a finished process (`None` when killed by a signal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn failed(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Captured result of a finished process, stdout followed by stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run to completion and capture the combined output
    async fn capture(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run, forwarding every output line to `sink` as it arrives
    async fn stream(&self, invocation: &Invocation, sink: &OutputSink) -> Result<CommandStatus>;
}

/// Runs real processes with tokio
#[derive(Debug, Clone, Default)]
pub struct SystemShell;

impl SystemShell {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn capture(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!(command = %invocation, "capture");

        let output = invocation
            .command()
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run `{}`", invocation.program))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let status = CommandStatus {
            code: output.status.code(),
        };
        tracing::debug!(command = %invocation, %status, "finished");

        Ok(CommandOutput { status, text })
    }

    async fn stream(&self, invocation: &Invocation, sink: &OutputSink) -> Result<CommandStatus> {
        tracing::debug!(command = %invocation, op = sink.op(), "stream");

        let mut child = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn `{}`", invocation.program))?;

        let stdout = child.stdout.take().context("Child stdout not captured")?;
        let stderr = child.stderr.take().context("Child stderr not captured")?;

        futures::try_join!(forward_lines(stdout, sink), forward_lines(stderr, sink))
            .context("Failed reading process output")?;

        let status = child.wait().await.context("Failed waiting for process")?;
        let status = CommandStatus { code: status.code() };
        tracing::debug!(command = %invocation, %status, "finished");

        Ok(status)
    }
}

/// Forward lines as they arrive; invalid UTF-8 is replaced rather than fatal
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, sink: &OutputSink) -> std::io::Result<()> {
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        sink.line(line.trim_end_matches('\r'));
    }
    Ok(())
}
