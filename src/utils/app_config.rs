/// Application configuration management
/// Stores user preferences in ~/.config/lgd-cli/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding one sub-folder per project (relative paths resolve against the cwd)
    pub dev_dir: PathBuf,
    /// Folder containing the Vagrantfile
    pub vagrant_dir: PathBuf,
    /// Folder scanned for backup archives (home directory when unset)
    pub backup_dir: Option<PathBuf>,
    pub backup_extension: String,
    pub vm_ip: String,
    /// Path of `dev_dir` as mounted inside the VM
    pub vm_dev_dir: String,
    pub filestore_root: String,
    pub db_container: String,
    pub db_user: String,
    /// Container tailed by the "main logs" action
    pub main_container: String,
    pub log_tail: usize,
    /// Developer identifier, overridden by the USERDEV environment variable
    pub developer: Option<String>,
    pub editor: String,
    pub recent_projects: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
            vagrant_dir: PathBuf::from("."),
            backup_dir: None,
            backup_extension: DEFAULT_BACKUP_EXTENSION.to_string(),
            vm_ip: DEFAULT_VM_IP.to_string(),
            vm_dev_dir: DEFAULT_VM_DEV_DIR.to_string(),
            filestore_root: DEFAULT_FILESTORE_ROOT.to_string(),
            db_container: DEFAULT_DB_CONTAINER.to_string(),
            db_user: DEFAULT_DB_USER.to_string(),
            main_container: DEFAULT_MAIN_CONTAINER.to_string(),
            log_tail: DEFAULT_LOG_TAIL,
            developer: None,
            editor: DEFAULT_EDITOR.to_string(),
            recent_projects: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Directory holding config.toml and the log folder
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(base.join(APP_NAME))
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Load configuration from a file; a missing file yields the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Move a project to the front of the recent list (bounded)
    pub fn remember_project(&mut self, project: &str) {
        self.recent_projects.retain(|p| p != project);
        self.recent_projects.insert(0, project.to_string());
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
    }

    /// Folder scanned for backups
    pub fn resolved_backup_dir(&self) -> Result<PathBuf> {
        match &self.backup_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir().context("Could not determine the home directory"),
        }
    }

    /// Human-readable problems with the current settings
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.vagrant_dir.join("Vagrantfile").exists() {
            errors.push(format!(
                "No Vagrantfile found in vagrant_dir ({})",
                self.vagrant_dir.display()
            ));
        }

        match self.resolved_backup_dir() {
            Ok(dir) if !dir.is_dir() => {
                errors.push(format!("backup_dir {} is not a directory", dir.display()))
            }
            Err(e) => errors.push(e.to_string()),
            _ => {}
        }

        if self.backup_extension.is_empty() || self.backup_extension.starts_with('.') {
            errors.push("backup_extension must be non-empty and given without a leading dot".to_string());
        }

        if self.log_tail == 0 {
            errors.push("log_tail must be greater than zero".to_string());
        }

        for (key, value) in [
            ("db_container", &self.db_container),
            ("db_user", &self.db_user),
            ("vm_dev_dir", &self.vm_dev_dir),
            ("filestore_root", &self.filestore_root),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty", key));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.db_container, "ldb");
        assert_eq!(config.log_tail, 300);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "vm_ip = \"10.0.0.5\"\nlog_tail = 50\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.vm_ip, "10.0.0.5");
        assert_eq!(config.log_tail, 50);
        assert_eq!(config.db_user, "odoo");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.developer = Some("jdoe".to_string());
        config.remember_project("shop");
        config.save_to(&path).unwrap();

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_remember_project_moves_to_front() {
        let mut config = AppConfig::default();
        config.remember_project("a");
        config.remember_project("b");
        config.remember_project("a");
        assert_eq!(config.recent_projects, vec!["a", "b"]);

        for i in 0..20 {
            config.remember_project(&format!("p{}", i));
        }
        assert_eq!(config.recent_projects.len(), MAX_RECENT_PROJECTS);
        assert_eq!(config.recent_projects[0], "p19");
    }

    #[test]
    fn test_validate_reports_missing_vagrantfile() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.vagrant_dir = dir.path().to_path_buf();
        config.backup_dir = Some(dir.path().to_path_buf());

        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Vagrantfile"));

        fs::write(dir.path().join("Vagrantfile"), "").unwrap();
        assert!(config.validate().is_empty());
    }
}
