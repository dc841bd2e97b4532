/// Vagrant VM control
///
/// Wraps `vagrant status/up/halt` and builds the `vagrant ssh -c` invocations
/// every docker operation goes through.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::output::OutputSink;
use crate::core::shell::{CommandStatus, Invocation, Shell};

/// Machine state as reported by `vagrant status --machine-readable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Running,
    PowerOff,
    Saved,
    Aborted,
    NotCreated,
    Other(String),
    Unknown,
}

impl VmState {
    /// Parse machine-readable output (`timestamp,target,type,data...`)
    pub fn from_machine_readable(output: &str) -> Self {
        output
            .lines()
            .map(|line| line.split(',').collect::<Vec<_>>())
            .find(|fields| fields.len() >= 4 && fields[2] == "state")
            .map(|fields| Self::from_state(fields[3].trim()))
            .unwrap_or(VmState::Unknown)
    }

    fn from_state(state: &str) -> Self {
        match state {
            "running" => VmState::Running,
            "poweroff" | "shutoff" | "stopped" => VmState::PowerOff,
            "saved" => VmState::Saved,
            "aborted" => VmState::Aborted,
            "not_created" => VmState::NotCreated,
            other => VmState::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running)
    }

    pub fn label(&self) -> &str {
        match self {
            VmState::Running => "running",
            VmState::PowerOff => "powered off",
            VmState::Saved => "saved",
            VmState::Aborted => "aborted",
            VmState::NotCreated => "not created",
            VmState::Other(s) => s,
            VmState::Unknown => "unknown",
        }
    }
}

#[derive(Clone)]
pub struct VagrantManager {
    shell: Arc<dyn Shell>,
    vagrant_dir: PathBuf,
}

impl VagrantManager {
    pub fn new(shell: Arc<dyn Shell>, vagrant_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            vagrant_dir: vagrant_dir.into(),
        }
    }

    pub fn shell(&self) -> &Arc<dyn Shell> {
        &self.shell
    }

    pub fn vagrant_dir(&self) -> &Path {
        &self.vagrant_dir
    }

    fn vagrant(&self, subcommand: &str) -> Invocation {
        Invocation::new("vagrant")
            .arg(subcommand)
            .current_dir(&self.vagrant_dir)
    }

    /// `vagrant ssh -c <command>`
    pub fn ssh(&self, command: impl Into<String>) -> Invocation {
        self.vagrant("ssh").arg("-c").arg(command)
    }

    /// Query VM state; a failing `vagrant` call counts as unknown rather than an error
    pub async fn status(&self) -> VmState {
        let invocation = self.vagrant("status").arg("--machine-readable");
        match self.shell.capture(&invocation).await {
            Ok(output) => VmState::from_machine_readable(&output.text),
            Err(e) => {
                tracing::warn!(error = %e, "vagrant status failed");
                VmState::Unknown
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.status().await.is_running()
    }

    /// Boot the VM unless it already runs
    pub async fn up(&self, sink: &OutputSink) -> Result<Option<CommandStatus>> {
        if self.is_running().await {
            sink.warn("The virtual machine is already running");
            return Ok(None);
        }

        sink.info("Running 'vagrant up'...");
        let status = self.shell.stream(&self.vagrant("up"), sink).await?;
        tracing::info!(%status, "vagrant up finished");
        if status.is_success() {
            sink.success("Environment started");
        } else {
            sink.error(format!("vagrant up failed ({})", status));
        }
        Ok(Some(status))
    }

    pub async fn halt(&self, sink: &OutputSink) -> Result<CommandStatus> {
        sink.info("Stopping the virtual machine...");
        let status = self.shell.stream(&self.vagrant("halt"), sink).await?;
        tracing::info!(%status, "vagrant halt finished");
        if status.is_success() {
            sink.success("Virtual machine stopped");
        } else {
            sink.error(format!("vagrant halt failed ({})", status));
        }
        Ok(status)
    }
}
