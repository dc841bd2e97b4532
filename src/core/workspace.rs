/// Wiring of configuration and managers
///
/// One `Workspace` is built at startup and cloned into every spawned task.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::backup::{list_backups, BackupArchive};
use crate::core::databases::DatabaseManager;
use crate::core::docker::DockerManager;
use crate::core::environment::{resolve_developer, EnvironmentName};
use crate::core::projects::{list_projects, open_in_editor};
use crate::core::restore::RestoreSequence;
use crate::core::shell::Shell;
use crate::core::tasks::write_tasks;
use crate::core::vagrant::VagrantManager;
use crate::utils::{absolutize, AppConfig, STAGING_DIR_NAME};

#[derive(Clone)]
pub struct Workspace {
    config: AppConfig,
    developer: String,
    databases: DatabaseManager,
}

impl Workspace {
    pub fn new(config: AppConfig, shell: Arc<dyn Shell>) -> Self {
        let vagrant = VagrantManager::new(shell, absolutize(&config.vagrant_dir));
        let docker = DockerManager::new(vagrant);
        let databases = DatabaseManager::new(docker, &config.db_container, &config.db_user);
        let developer = resolve_developer(config.developer.as_deref());

        tracing::debug!(developer = %developer, dev_dir = %config.dev_dir.display(), "workspace ready");

        Self {
            config,
            developer,
            databases,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn developer(&self) -> &str {
        &self.developer
    }

    pub fn vagrant(&self) -> &VagrantManager {
        self.databases.docker().vagrant()
    }

    pub fn docker(&self) -> &DockerManager {
        self.databases.docker()
    }

    pub fn databases(&self) -> &DatabaseManager {
        &self.databases
    }

    pub fn environment_name(&self, project: &str) -> EnvironmentName {
        EnvironmentName::derive(project, &self.developer)
    }

    pub fn dev_dir(&self) -> PathBuf {
        absolutize(&self.config.dev_dir)
    }

    pub fn project_path(&self, project: &str) -> PathBuf {
        self.dev_dir().join(project)
    }

    pub fn projects(&self) -> Result<Vec<String>> {
        list_projects(&self.dev_dir(), &self.config.recent_projects)
    }

    pub fn backups(&self) -> Result<Vec<BackupArchive>> {
        let dir = self.config.resolved_backup_dir()?;
        Ok(list_backups(&dir, &self.config.backup_extension)?)
    }

    pub fn restore_sequence(&self, strict: bool) -> RestoreSequence {
        let vm_staging = format!(
            "{}/{}",
            self.config.vm_dev_dir.trim_end_matches('/'),
            STAGING_DIR_NAME
        );
        RestoreSequence::new(
            self.databases.clone(),
            self.developer.clone(),
            self.dev_dir().join(STAGING_DIR_NAME),
            vm_staging,
            self.config.filestore_root.clone(),
        )
        .strict(strict)
    }

    /// Path of a project listed under the dev folder
    ///
    /// Anything else (a typo, `temp`, a name with `/` or `..`) is rejected
    /// before it can name a container, database or filestore.
    pub fn require_project(&self, project: &str) -> Result<PathBuf> {
        if !self.projects()?.iter().any(|p| p == project) {
            anyhow::bail!(
                "'{}' is not a project folder of {}",
                project,
                self.dev_dir().display()
            );
        }
        Ok(self.project_path(project))
    }

    /// Write the project's task file, returning its path
    pub fn write_tasks(&self, project: &str) -> Result<PathBuf> {
        let path = self.require_project(project)?;
        write_tasks(&path, self.environment_name(project).as_str())
    }

    /// Write the task file, remember the project and launch the editor
    pub fn open_project(&mut self, project: &str) -> Result<PathBuf> {
        let tasks = self.write_tasks(project)?;

        self.config.remember_project(project);
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "could not persist recent projects");
        }

        open_in_editor(&self.config.editor, &self.project_path(project))
            .context("Task file written but the editor could not be started")?;
        Ok(tasks)
    }
}
