/// Project folders under the development directory

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::utils::STAGING_DIR_NAME;

/// Project folder names in `dev_dir`, creating it when missing.
///
/// Projects listed in `recent` come first in that order, the rest follow
/// alphabetically. The staging folder is never a project.
pub fn list_projects(dev_dir: &Path, recent: &[String]) -> Result<Vec<String>> {
    if !dev_dir.exists() {
        fs::create_dir_all(dev_dir)
            .with_context(|| format!("Failed to create {}", dev_dir.display()))?;
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dev_dir).with_context(|| format!("Failed to read {}", dev_dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name != STAGING_DIR_NAME {
            names.push(name);
        }
    }
    names.sort();

    let mut ordered: Vec<String> = recent
        .iter()
        .filter(|r| names.contains(r))
        .cloned()
        .collect();
    ordered.extend(names.into_iter().filter(|n| !recent.contains(n)));

    Ok(ordered)
}

/// Launch `editor <path>` without waiting for it
pub fn open_in_editor(editor: &str, path: &Path) -> Result<()> {
    let child = Command::new(editor)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch editor '{}'", editor))?;

    tracing::info!(editor, path = %path.display(), pid = child.id(), "editor launched");
    Ok(())
}
