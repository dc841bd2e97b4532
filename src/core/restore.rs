/// Backup restore sequence
///
/// A linear script of independent commands: extract, stop container, drop
/// database, create database, copy and run the dump, swap the filestore.
/// Nothing is rolled back. A failure returns the report of the steps that
/// already ran so a half-finished restore is visible as such.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::backup::{extract, BackupError, ExtractedBackup};
use crate::core::databases::DatabaseManager;
use crate::core::environment::EnvironmentName;
use crate::core::output::OutputSink;
use crate::core::shell::CommandStatus;
use crate::utils::{shell_join, DUMP_FILE_NAME, FILESTORE_DIR_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    Extract,
    StopContainer,
    DropDatabase,
    CreateDatabase,
    CopyDump,
    RestoreDump,
    RemoveFilestore,
    PrepareFilestore,
    MoveFilestore,
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RestoreStep::Extract => "extract archive",
            RestoreStep::StopContainer => "stop container",
            RestoreStep::DropDatabase => "drop database",
            RestoreStep::CreateDatabase => "create database",
            RestoreStep::CopyDump => "copy dump",
            RestoreStep::RestoreDump => "restore dump",
            RestoreStep::RemoveFilestore => "remove filestore",
            RestoreStep::PrepareFilestore => "prepare filestore folder",
            RestoreStep::MoveFilestore => "move filestore",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Step '{step}' failed with {status}")]
    StepFailed { step: RestoreStep, status: CommandStatus },

    #[error("Step '{step}' could not run: {source}")]
    Command {
        step: RestoreStep,
        #[source]
        source: anyhow::Error,
    },
}

/// One executed step; host-side steps carry no exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: RestoreStep,
    pub status: Option<CommandStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub environment: EnvironmentName,
    pub steps: Vec<StepOutcome>,
    pub filestore_restored: bool,
}

impl RestoreReport {
    fn new(environment: EnvironmentName) -> Self {
        Self {
            environment,
            steps: Vec::new(),
            filestore_restored: false,
        }
    }

    fn record(&mut self, step: RestoreStep, status: Option<CommandStatus>) {
        self.steps.push(StepOutcome { step, status });
    }

    pub fn completed(&self) -> Vec<RestoreStep> {
        self.steps.iter().map(|s| s.step).collect()
    }

    /// Steps whose command exited non-zero
    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.steps
            .iter()
            .filter(|s| s.status.map_or(false, |st| !st.is_success()))
            .collect()
    }

    /// True once the old database may be gone
    pub fn touched_database(&self) -> bool {
        self.steps.iter().any(|s| s.step == RestoreStep::DropDatabase)
    }
}

#[derive(Debug)]
pub struct RestoreFailure {
    pub report: RestoreReport,
    pub error: RestoreError,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let done = self.report.completed();
        if done.is_empty() {
            write!(f, " (nothing was changed)")
        } else {
            let labels: Vec<String> = done.iter().map(ToString::to_string).collect();
            write!(f, " (already done: {})", labels.join(", "))
        }
    }
}

impl std::error::Error for RestoreFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub project: String,
    pub archive: PathBuf,
}

pub struct RestoreSequence {
    databases: DatabaseManager,
    developer: String,
    /// Staging folder on the host
    host_staging: PathBuf,
    /// The same folder as seen from inside the VM
    vm_staging: String,
    filestore_root: String,
    /// Abort on the first non-zero exit instead of carrying on
    strict: bool,
}

impl RestoreSequence {
    pub fn new(
        databases: DatabaseManager,
        developer: impl Into<String>,
        host_staging: impl Into<PathBuf>,
        vm_staging: impl Into<String>,
        filestore_root: impl Into<String>,
    ) -> Self {
        Self {
            databases,
            developer: developer.into(),
            host_staging: host_staging.into(),
            vm_staging: vm_staging.into(),
            filestore_root: filestore_root.into(),
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn environment(&self, project: &str) -> EnvironmentName {
        EnvironmentName::derive(project, &self.developer)
    }

    pub async fn run(&self, request: &RestoreRequest, sink: &OutputSink) -> Result<RestoreReport, RestoreFailure> {
        let name = self.environment(&request.project);
        let mut report = RestoreReport::new(name.clone());

        tracing::info!(
            environment = %name,
            archive = %request.archive.display(),
            strict = self.strict,
            "restore started"
        );

        match self.run_steps(request, &name, &mut report, sink).await {
            Ok(()) => {
                tracing::info!(environment = %name, "restore finished");
                sink.success(format!("Database restored into '{}'", name));
                Ok(report)
            }
            Err(error) => {
                let failure = RestoreFailure { report, error };
                tracing::error!(environment = %name, error = %failure, "restore aborted");
                sink.error(format!("Restore failed: {}", failure));
                Err(failure)
            }
        }
    }

    async fn run_steps(
        &self,
        request: &RestoreRequest,
        name: &EnvironmentName,
        report: &mut RestoreReport,
        sink: &OutputSink,
    ) -> Result<(), RestoreError> {
        let docker = self.databases.docker();

        sink.info("Extracting backup archive...");
        let extracted = self.extract(request).await?;
        report.record(RestoreStep::Extract, None);

        // Best effort: the container may not exist or may already be stopped
        sink.info(format!("Stopping container '{}'...", name));
        match docker.stop_container(name.as_str(), sink).await {
            Ok(status) => report.record(RestoreStep::StopContainer, Some(status)),
            Err(e) => {
                tracing::warn!(error = %e, "stopping container failed, continuing");
                report.record(RestoreStep::StopContainer, None);
            }
        }

        sink.info("Dropping previous database...");
        self.step(report, sink, RestoreStep::DropDatabase, self.databases.drop(name.as_str(), sink))
            .await?;

        sink.info("Creating new database...");
        self.step(report, sink, RestoreStep::CreateDatabase, self.databases.create(name.as_str(), sink))
            .await?;

        sink.info("Restoring data...");
        let vm_dump = format!("{}/{}", self.vm_staging, DUMP_FILE_NAME);
        self.step(report, sink, RestoreStep::CopyDump, self.databases.copy_dump(&vm_dump, sink))
            .await?;
        self.step(report, sink, RestoreStep::RestoreDump, self.databases.restore_dump(name.as_str(), sink))
            .await?;

        sink.info("Updating filestore...");
        if extracted.filestore.is_none() {
            sink.warn("No filestore folder in the backup");
            return Ok(());
        }

        let target = name.filestore_path(&self.filestore_root);
        let parent = target.rsplit_once('/').map(|(p, _)| p).unwrap_or("/");
        let source = format!("{}/{}", self.vm_staging, FILESTORE_DIR_NAME);

        self.step(report, sink, RestoreStep::RemoveFilestore, self.vm(&["sudo", "rm", "-rf", target.as_str()], sink))
            .await?;
        self.step(report, sink, RestoreStep::PrepareFilestore, self.vm(&["sudo", "mkdir", "-p", parent], sink))
            .await?;
        self.step(
            report,
            sink,
            RestoreStep::MoveFilestore,
            self.vm(&["sudo", "mv", source.as_str(), target.as_str()], sink),
        )
        .await?;

        report.filestore_restored = true;
        sink.success("Filestore updated");
        Ok(())
    }

    async fn extract(&self, request: &RestoreRequest) -> Result<ExtractedBackup, RestoreError> {
        let archive = request.archive.clone();
        let staging = self.host_staging.clone();

        tokio::task::spawn_blocking(move || extract(&archive, &staging))
            .await
            .map_err(|e| RestoreError::Command {
                step: RestoreStep::Extract,
                source: e.into(),
            })?
            .map_err(RestoreError::from)
    }

    /// Run a plain command inside the VM
    async fn vm(&self, words: &[&str], sink: &OutputSink) -> anyhow::Result<CommandStatus> {
        let vagrant = self.databases.docker().vagrant();
        let invocation = vagrant.ssh(shell_join(words));
        sink.command(invocation.to_string());
        vagrant.shell().stream(&invocation, sink).await
    }

    async fn step<F>(
        &self,
        report: &mut RestoreReport,
        sink: &OutputSink,
        step: RestoreStep,
        command: F,
    ) -> Result<(), RestoreError>
    where
        F: Future<Output = anyhow::Result<CommandStatus>>,
    {
        let status = command
            .await
            .map_err(|source| RestoreError::Command { step, source })?;
        report.record(step, Some(status));

        if !status.is_success() {
            tracing::warn!(%step, %status, "restore step exited non-zero");
            if self.strict {
                return Err(RestoreError::StepFailed { step, status });
            }
            sink.warn(format!("'{}' exited with {}, continuing", step, status));
        }
        Ok(())
    }
}
