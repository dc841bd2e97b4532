/// Environment naming
///
/// A project's container and database share one name:
/// `<project>-local-<developer>`. Nothing checks uniqueness beyond the
/// convention itself.

use std::fmt;

use crate::utils::{DEFAULT_DEVELOPER, DEVELOPER_ENV, ENVIRONMENT_INFIX};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn derive(project: &str, developer: &str) -> Self {
        Self(format!("{}{}{}", project, ENVIRONMENT_INFIX, developer))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filestore location inside the VM for this environment
    pub fn filestore_path(&self, filestore_root: &str) -> String {
        format!(
            "{}/{}/filestore/{}",
            filestore_root.trim_end_matches('/'),
            self.0,
            self.0
        )
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EnvironmentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Developer identifier: USERDEV, then the configured value, then the fallback
pub fn resolve_developer(configured: Option<&str>) -> String {
    pick_developer(std::env::var(DEVELOPER_ENV).ok().as_deref(), configured)
}

fn pick_developer(from_env: Option<&str>, configured: Option<&str>) -> String {
    [from_env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(DEFAULT_DEVELOPER)
        .to_string()
}
