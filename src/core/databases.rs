/// PostgreSQL database management inside the database container

use anyhow::{anyhow, Result};

use crate::core::docker::DockerManager;
use crate::core::output::OutputSink;
use crate::core::shell::CommandStatus;
use crate::utils::CONTAINER_DUMP_PATH;

#[derive(Clone)]
pub struct DatabaseManager {
    docker: DockerManager,
    container: String,
    user: String,
}

/// Extract database names from `psql -l` output.
///
/// The first two lines are the title and column header; separator rows,
/// the `(N rows)` footer, wrapped privilege rows and templates are skipped.
pub fn parse_database_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(2)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with('-') && !line.trim_start().starts_with('('))
        .filter_map(|line| line.split('|').next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.starts_with("template"))
        .map(str::to_string)
        .collect()
}

impl DatabaseManager {
    pub fn new(docker: DockerManager, container: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            docker,
            container: container.into(),
            user: user.into(),
        }
    }

    pub fn docker(&self) -> &DockerManager {
        &self.docker
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let invocation = self
            .docker
            .docker(&["exec", self.container.as_str(), "psql", "-U", self.user.as_str(), "-l"]);
        let output = self.docker.vagrant().shell().capture(&invocation).await?;

        if !output.status.is_success() {
            return Err(anyhow!(
                "Listing databases failed ({}): {}",
                output.status,
                output.text.trim()
            ));
        }

        Ok(parse_database_list(&output.text))
    }

    /// `dropdb --if-exists`
    pub async fn drop(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.docker
            .run_announced(
                &["exec", self.container.as_str(), "dropdb", "-U", self.user.as_str(), "--if-exists", name],
                sink,
            )
            .await
    }

    pub async fn create(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.docker
            .run_announced(
                &["exec", self.container.as_str(), "createdb", "-U", self.user.as_str(), name],
                sink,
            )
            .await
    }

    /// Copy a dump from the VM filesystem into the database container
    pub async fn copy_dump(&self, vm_dump_path: &str, sink: &OutputSink) -> Result<CommandStatus> {
        let target = format!("{}:{}", self.container, CONTAINER_DUMP_PATH);
        self.docker
            .run_announced(&["cp", vm_dump_path, target.as_str()], sink)
            .await
    }

    /// Execute the copied dump against `name`
    pub async fn restore_dump(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.docker
            .run_announced(
                &["exec", self.container.as_str(), "psql", "-U", self.user.as_str(), "-f", CONTAINER_DUMP_PATH, name],
                sink,
            )
            .await
    }

    /// Stop the environment's container, then drop its database
    pub async fn delete(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        sink.info(format!("Stopping container '{}'...", name));
        let stop = self.docker.stop_container(name, sink).await?;
        if !stop.is_success() {
            tracing::debug!(container = name, %stop, "stop before drop failed, continuing");
        }

        sink.info(format!("Dropping database '{}'...", name));
        let status = self.drop(name, sink).await?;
        tracing::info!(database = name, %status, "database dropped");

        if status.is_success() {
            sink.success(format!("Database '{}' deleted", name));
        } else {
            sink.error(format!("dropdb exited with {}", status));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shell::testing::RecordingShell;
    use crate::core::vagrant::VagrantManager;
    use std::sync::Arc;

    const PSQL_LIST: &str = "                                  List of databases
       Name       | Owner | Encoding |  Collate   |   Ctype    | Access privileges
------------------+-------+----------+------------+------------+-------------------
 postgres         | odoo  | UTF8     | en_US.utf8 | en_US.utf8 |
 shop-local-jdoe  | odoo  | UTF8     | en_US.utf8 | en_US.utf8 |
 template0        | odoo  | UTF8     | en_US.utf8 | en_US.utf8 | =c/odoo          +
                  |       |          |            |            | odoo=CTc/odoo
 template1        | odoo  | UTF8     | en_US.utf8 | en_US.utf8 | =c/odoo          +
                  |       |          |            |            | odoo=CTc/odoo
(4 rows)

";

    fn manager(shell: Arc<RecordingShell>) -> DatabaseManager {
        DatabaseManager::new(DockerManager::new(VagrantManager::new(shell, ".")), "ldb", "odoo")
    }

    #[test]
    fn test_parse_database_list() {
        assert_eq!(parse_database_list(PSQL_LIST), vec!["postgres", "shop-local-jdoe"]);
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_database_list("").is_empty());
        assert!(parse_database_list("List of databases\n Name | Owner\n---+---\n(0 rows)\n").is_empty());
    }

    #[tokio::test]
    async fn test_list_runs_psql_in_db_container() {
        let shell = Arc::new(RecordingShell::new().respond("psql -U odoo -l", 0, PSQL_LIST));
        let dbs = manager(shell.clone()).list().await.unwrap();
        assert_eq!(dbs.len(), 2);
        assert_eq!(shell.calls(), vec!["vagrant ssh -c 'docker exec ldb psql -U odoo -l'"]);
    }

    #[tokio::test]
    async fn test_delete_stops_then_drops() {
        let shell = Arc::new(RecordingShell::new().respond("docker stop", 1, "No such container"));
        let status = manager(shell.clone())
            .delete("shop-local-jdoe", &OutputSink::discard())
            .await
            .unwrap();

        assert!(status.is_success());
        assert_eq!(
            shell.calls(),
            vec![
                "vagrant ssh -c 'docker stop shop-local-jdoe'",
                "vagrant ssh -c 'docker exec ldb dropdb -U odoo --if-exists shop-local-jdoe'",
            ]
        );
    }
}
