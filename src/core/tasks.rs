/// Editor task file generation
///
/// Writes `<project>/.vscode/tasks.json` with start/restart/stop tasks for
/// the project's container. An existing file is overwritten.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::{
    TASKS_DIR_NAME, TASKS_FILE_NAME, TASKS_VERSION, TASK_LABEL_RESTART, TASK_LABEL_START,
    TASK_LABEL_STOP,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksFile {
    pub version: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub label: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub command: String,
    pub presentation: Presentation,
    pub group: TaskGroup,
    pub problem_matcher: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub reveal: String,
    pub panel: String,
    pub focus: bool,
    pub clear: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            reveal: "always".to_string(),
            panel: "dedicated".to_string(),
            focus: true,
            clear: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskGroup {
    Default {
        kind: String,
        #[serde(rename = "isDefault")]
        is_default: bool,
    },
    Named(String),
}

fn shell_task(label: &str, command: String, group: TaskGroup) -> Task {
    Task {
        label: label.to_string(),
        task_type: "shell".to_string(),
        command,
        presentation: Presentation::default(),
        group,
        problem_matcher: Vec::new(),
    }
}

impl TasksFile {
    /// The three container tasks for `container`
    pub fn for_container(container: &str) -> Self {
        let test_group = || TaskGroup::Named("test".to_string());

        Self {
            version: TASKS_VERSION.to_string(),
            tasks: vec![
                shell_task(
                    TASK_LABEL_START,
                    format!(
                        "vagrant ssh -c 'docker start {c} && docker logs -f {c}'",
                        c = container
                    ),
                    TaskGroup::Default {
                        kind: "test".to_string(),
                        is_default: true,
                    },
                ),
                shell_task(
                    TASK_LABEL_RESTART,
                    format!(
                        "vagrant ssh -c 'docker restart {c} && docker logs -f {c}'",
                        c = container
                    ),
                    test_group(),
                ),
                shell_task(
                    TASK_LABEL_STOP,
                    format!(
                        "vagrant ssh -c 'docker stop {} && echo \"Container stopped\"'",
                        container
                    ),
                    test_group(),
                ),
            ],
        }
    }

    /// Pretty JSON with four-space indentation
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).context("Failed to serialize tasks.json")?;
        String::from_utf8(buf).context("tasks.json is not valid UTF-8")
    }
}

pub fn tasks_path(project_path: &Path) -> PathBuf {
    project_path.join(TASKS_DIR_NAME).join(TASKS_FILE_NAME)
}

/// Create `.vscode` if needed and (over)write the task file
pub fn write_tasks(project_path: &Path, container: &str) -> Result<PathBuf> {
    let path = tasks_path(project_path);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let json = TasksFile::for_container(container).to_json()?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), container, "task file written");
    Ok(path)
}
