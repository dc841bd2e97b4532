/// Docker integration through the Vagrant VM
///
/// Docker runs inside the VM, so every call is `vagrant ssh -c "docker ..."`.

use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;

use crate::core::output::OutputSink;
use crate::core::shell::{CommandStatus, Invocation};
use crate::core::vagrant::VagrantManager;
use crate::utils::shell_join;

const PS_FORMAT: &str = "{{.Names}}|{{.Image}}|{{.Ports}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    pub image: String,
    /// Raw `{{.Ports}}` column, e.g. `0.0.0.0:8069->8069/tcp, 8072/tcp`
    pub ports: String,
}

impl ContainerInfo {
    /// Parse one `name|image|ports` line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut parts = line.splitn(3, '|');
        let name = parts.next()?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let image = parts.next().unwrap_or("").trim().to_string();
        let ports = parts.next().unwrap_or("").trim().to_string();

        Some(Self { name, image, ports })
    }

    /// Host ports published on all interfaces
    pub fn published_ports(&self) -> Vec<u16> {
        static PORT_RE: OnceLock<Regex> = OnceLock::new();
        let re = PORT_RE.get_or_init(|| Regex::new(r"0\.0\.0\.0:(\d+)").expect("valid port regex"));

        let mut ports: Vec<u16> = re
            .captures_iter(&self.ports)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .collect();
        ports.dedup();
        ports
    }

    /// Browsable URLs for published ports; empty when nothing is mapped
    pub fn urls(&self, vm_ip: &str) -> Vec<String> {
        self.published_ports()
            .into_iter()
            .map(|port| format!("http://{}:{}", vm_ip, port))
            .collect()
    }
}

/// Odoo module operation run inside an application container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleAction {
    Update,
    Install,
}

impl ModuleAction {
    fn flag(&self) -> &'static str {
        match self {
            ModuleAction::Update => "-u",
            ModuleAction::Install => "-i",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ModuleAction::Update => "Updating",
            ModuleAction::Install => "Installing",
        }
    }
}

#[derive(Clone)]
pub struct DockerManager {
    vagrant: VagrantManager,
}

impl DockerManager {
    pub fn new(vagrant: VagrantManager) -> Self {
        Self { vagrant }
    }

    pub fn vagrant(&self) -> &VagrantManager {
        &self.vagrant
    }

    /// `vagrant ssh -c 'docker <args>'`
    pub fn docker<S: AsRef<str>>(&self, args: &[S]) -> Invocation {
        let mut words = vec!["docker".to_string()];
        words.extend(args.iter().map(|a| a.as_ref().to_string()));
        self.vagrant.ssh(shell_join(&words))
    }

    /// Run a docker command, forwarding output
    pub async fn run<S: AsRef<str>>(&self, args: &[S], sink: &OutputSink) -> Result<CommandStatus> {
        let invocation = self.docker(args);
        self.vagrant.shell().stream(&invocation, sink).await
    }

    /// Same as `run`, announcing the command line first
    pub async fn run_announced<S: AsRef<str>>(&self, args: &[S], sink: &OutputSink) -> Result<CommandStatus> {
        let invocation = self.docker(args);
        sink.command(invocation.to_string());
        self.vagrant.shell().stream(&invocation, sink).await
    }

    /// Running containers
    pub async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let output = self
            .vagrant
            .shell()
            .capture(&self.docker(&["ps", "--format", PS_FORMAT]))
            .await?;

        if !output.status.is_success() {
            return Err(anyhow!(
                "docker ps failed ({}): {}",
                output.status,
                output.text.trim()
            ));
        }

        Ok(output.text.lines().filter_map(ContainerInfo::parse).collect())
    }

    pub async fn start_container(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.run_announced(&["start", name], sink).await
    }

    pub async fn stop_container(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.run_announced(&["stop", name], sink).await
    }

    pub async fn restart_container(&self, name: &str, sink: &OutputSink) -> Result<CommandStatus> {
        self.run_announced(&["restart", name], sink).await
    }

    /// Tail logs until the process ends or the task is aborted
    pub async fn follow_logs(&self, name: &str, tail: usize, sink: &OutputSink) -> Result<CommandStatus> {
        sink.info(format!("Showing logs of {}...", name));
        let tail = tail.to_string();
        self.run(&["logs", "-f", name, "--tail", tail.as_str()], sink).await
    }

    /// Print each running container with URLs for its published ports
    pub async fn report_ports(&self, vm_ip: &str, sink: &OutputSink) -> Result<Vec<ContainerInfo>> {
        sink.info("Running containers:");
        let containers = self.list_containers().await?;

        for container in &containers {
            sink.line(format!("📦 Container: {}", container.name));
            sink.line(format!("   Image: {}", container.image));
            let urls = container.urls(vm_ip);
            if urls.is_empty() {
                sink.warn(format!("   {}: no mapped ports", container.name));
            }
            for url in urls {
                sink.line(format!("   🔗 {}", url));
            }
            sink.line("");
        }

        if containers.is_empty() {
            sink.warn("No running containers");
        }
        sink.success("Listing complete");
        Ok(containers)
    }

    /// `odoo -u|-i <module> -d <container> --stop-after-init` inside the container
    pub async fn run_module_action(
        &self,
        action: ModuleAction,
        container: &str,
        module: &str,
        sink: &OutputSink,
    ) -> Result<CommandStatus> {
        sink.info(format!("{} module '{}' in {}...", action.verb(), module, container));
        let status = self
            .run_announced(
                &["exec", container, "odoo", action.flag(), module, "-d", container, "--stop-after-init"],
                sink,
            )
            .await?;

        if status.is_success() {
            sink.success(format!("Module '{}' done", module));
        } else {
            sink.error(format!("odoo exited with {}", status));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::{collecting_sink, drain, OutputEvent};
    use crate::core::shell::testing::RecordingShell;
    use std::sync::Arc;

    fn manager(shell: Arc<RecordingShell>) -> DockerManager {
        DockerManager::new(VagrantManager::new(shell, "."))
    }

    #[test]
    fn test_parse_ps_line() {
        let c = ContainerInfo::parse("shop-local-jdoe|odoo:16|0.0.0.0:8069->8069/tcp, 8072/tcp\n").unwrap();
        assert_eq!(c.name, "shop-local-jdoe");
        assert_eq!(c.image, "odoo:16");
        assert_eq!(c.published_ports(), vec![8069]);

        let bare = ContainerInfo::parse("ldb").unwrap();
        assert_eq!(bare.image, "");
        assert_eq!(bare.ports, "");

        assert!(ContainerInfo::parse("   ").is_none());
    }

    #[test]
    fn test_no_mapped_ports_means_no_urls() {
        let internal = ContainerInfo::parse("ldb|postgres:14|5432/tcp").unwrap();
        assert!(internal.urls("192.168.56.10").is_empty());

        let local_only = ContainerInfo::parse("x|img|127.0.0.1:9000->9000/tcp").unwrap();
        assert!(local_only.urls("192.168.56.10").is_empty());

        let empty = ContainerInfo::parse("y|img|").unwrap();
        assert!(empty.urls("192.168.56.10").is_empty());
    }

    #[test]
    fn test_urls_for_each_mapping() {
        let c = ContainerInfo::parse(
            "web|odoo|0.0.0.0:8069->8069/tcp, :::8069->8069/tcp, 0.0.0.0:8072->8072/tcp",
        )
        .unwrap();
        assert_eq!(
            c.urls("192.168.56.10"),
            vec!["http://192.168.56.10:8069", "http://192.168.56.10:8072"]
        );
    }

    #[test]
    fn test_docker_invocation_goes_through_ssh() {
        let docker = manager(Arc::new(RecordingShell::new()));
        let inv = docker.docker(&["stop", "shop-local-jdoe"]);
        assert_eq!(inv.program, "vagrant");
        assert_eq!(inv.args, vec!["ssh", "-c", "docker stop shop-local-jdoe"]);

        let ps = docker.docker(&["ps", "--format", PS_FORMAT]);
        assert_eq!(ps.args[2], "docker ps --format '{{.Names}}|{{.Image}}|{{.Ports}}'");
    }

    #[tokio::test]
    async fn test_report_ports_warns_instead_of_fabricating() {
        let shell = Arc::new(RecordingShell::new().respond(
            "docker ps",
            0,
            "web|odoo:16|0.0.0.0:8069->8069/tcp\nldb|postgres:14|5432/tcp\n",
        ));
        let docker = manager(shell);
        let (sink, mut rx) = collecting_sink();

        let containers = docker.report_ports("10.0.0.2", &sink).await.unwrap();
        assert_eq!(containers.len(), 2);

        let events = drain(&mut rx);
        let url_lines: Vec<_> = events
            .iter()
            .filter(|e| e.text().contains("http://"))
            .collect();
        assert_eq!(url_lines.len(), 1);
        assert!(url_lines[0].text().contains("http://10.0.0.2:8069"));
        assert!(events.contains(&OutputEvent::Warning("   ldb: no mapped ports".into())));
    }

    #[tokio::test]
    async fn test_list_containers_failure() {
        let shell = Arc::new(RecordingShell::new().respond("docker ps", 255, "ssh: connect refused"));
        let docker = manager(shell);
        let err = docker.list_containers().await.unwrap_err();
        assert!(err.to_string().contains("connect refused"));
    }

    #[tokio::test]
    async fn test_module_action_command() {
        let shell = Arc::new(RecordingShell::new());
        let docker = manager(shell.clone());

        docker
            .run_module_action(ModuleAction::Install, "shop-local-jdoe", "sale", &OutputSink::discard())
            .await
            .unwrap();

        assert_eq!(
            shell.calls(),
            vec!["vagrant ssh -c 'docker exec shop-local-jdoe odoo -i sale -d shop-local-jdoe --stop-after-init'"]
        );
    }

    #[tokio::test]
    async fn test_follow_logs_command() {
        let shell = Arc::new(RecordingShell::new());
        let docker = manager(shell.clone());
        docker.follow_logs("lgdoo", 300, &OutputSink::discard()).await.unwrap();
        assert_eq!(shell.calls(), vec!["vagrant ssh -c 'docker logs -f lgdoo --tail 300'"]);
    }
}
