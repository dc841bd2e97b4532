use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use lgd_cli::app::App;
use lgd_cli::cli::{
    Cli, Commands, ConfigCommands, ContainerCommands, DbCommands, ModuleCommands, VERSION_WITH_BUILD,
};
use lgd_cli::core::backup::BackupArchive;
use lgd_cli::core::output::console_sink;
use lgd_cli::core::restore::RestoreRequest;
use lgd_cli::core::{SystemShell, Workspace};
use lgd_cli::logging::init_logging;
use lgd_cli::utils::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry USERDEV; a missing file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose && cli.command.is_some())?;
    tracing::info!(version = VERSION_WITH_BUILD, "lgd-cli starting");

    let config = AppConfig::load()?;
    let workspace = Workspace::new(config, Arc::new(SystemShell::new()));

    match cli.command {
        None => {
            // No command - run interactive TUI
            let mut app = App::new(workspace);
            app.run().await?;
        }
        Some(Commands::Status) => handle_status(&workspace).await?,
        Some(Commands::Up) => handle_up(&workspace).await?,
        Some(Commands::Halt) => handle_halt(&workspace).await?,
        Some(Commands::Logs { container, tail }) => handle_logs(&workspace, container, tail).await?,
        Some(Commands::Ports) => handle_ports(&workspace).await?,
        Some(Commands::Container { command }) => handle_container(&workspace, command).await?,
        Some(Commands::Projects) => handle_projects(&workspace)?,
        Some(Commands::Open { project }) => handle_open(workspace, &project)?,
        Some(Commands::Tasks { project }) => handle_tasks(&workspace, &project)?,
        Some(Commands::Db { command }) => handle_db(&workspace, command).await?,
        Some(Commands::Backups) => handle_backups(&workspace)?,
        Some(Commands::Module { command }) => handle_module(&workspace, command).await?,
        Some(Commands::Config { command }) => handle_config(&workspace, command)?,
    }

    Ok(())
}

async fn handle_status(workspace: &Workspace) -> Result<()> {
    let state = workspace.vagrant().status().await;
    let label = if state.is_running() {
        state.label().green()
    } else {
        state.label().yellow()
    };

    println!("VM:        {}", label);
    println!("Developer: {}", workspace.developer());
    println!("Vagrant:   {}", workspace.vagrant().vagrant_dir().display());
    println!("Projects:  {}", workspace.dev_dir().display());
    Ok(())
}

async fn handle_up(workspace: &Workspace) -> Result<()> {
    let (sink, printer) = console_sink();
    let result = workspace.vagrant().up(&sink).await;
    drop(sink);
    printer.await?;

    match result? {
        Some(status) if !status.is_success() => bail!("vagrant up failed ({})", status),
        _ => Ok(()),
    }
}

async fn handle_halt(workspace: &Workspace) -> Result<()> {
    let (sink, printer) = console_sink();
    let result = workspace.vagrant().halt(&sink).await;
    drop(sink);
    printer.await?;

    let status = result?;
    if !status.is_success() {
        bail!("vagrant halt failed ({})", status);
    }
    Ok(())
}

async fn handle_logs(workspace: &Workspace, container: Option<String>, tail: Option<usize>) -> Result<()> {
    let config = workspace.config();
    let container = container.unwrap_or_else(|| config.main_container.clone());
    let tail = tail.unwrap_or(config.log_tail);

    let (sink, printer) = console_sink();
    let result = workspace.docker().follow_logs(&container, tail, &sink).await;
    drop(sink);
    printer.await?;

    result?;
    Ok(())
}

async fn handle_ports(workspace: &Workspace) -> Result<()> {
    let (sink, printer) = console_sink();
    let result = workspace
        .docker()
        .report_ports(&workspace.config().vm_ip, &sink)
        .await;
    drop(sink);
    printer.await?;

    result?;
    Ok(())
}

async fn handle_container(workspace: &Workspace, command: ContainerCommands) -> Result<()> {
    let docker = workspace.docker();
    let (sink, printer) = console_sink();
    let result = match &command {
        ContainerCommands::Start { name } => docker.start_container(name, &sink).await,
        ContainerCommands::Stop { name } => docker.stop_container(name, &sink).await,
        ContainerCommands::Restart { name } => docker.restart_container(name, &sink).await,
    };
    drop(sink);
    printer.await?;

    let status = result?;
    if !status.is_success() {
        bail!("docker exited with {}", status);
    }
    Ok(())
}

fn handle_projects(workspace: &Workspace) -> Result<()> {
    let projects = workspace.projects()?;
    if projects.is_empty() {
        println!("No projects in {}", workspace.dev_dir().display());
        return Ok(());
    }

    println!("{:<30} {}", "Project", "Environment");
    println!("{}", "-".repeat(60));
    for project in projects {
        println!("{:<30} {}", project, workspace.environment_name(&project));
    }
    Ok(())
}

fn handle_open(mut workspace: Workspace, project: &str) -> Result<()> {
    let tasks = workspace.open_project(project)?;
    println!("{} Task file written: {}", "✓".green(), tasks.display());
    println!("{} Opened {} in {}", "✓".green(), project, workspace.config().editor);
    Ok(())
}

fn handle_tasks(workspace: &Workspace, project: &str) -> Result<()> {
    let tasks = workspace.write_tasks(project)?;
    println!("{} Task file written: {}", "✓".green(), tasks.display());
    Ok(())
}

async fn handle_db(workspace: &Workspace, command: DbCommands) -> Result<()> {
    match command {
        DbCommands::List => {
            let databases = workspace.databases().list().await?;
            if databases.is_empty() {
                println!("No databases found");
            }
            for name in databases {
                println!("{}", name);
            }
        }
        DbCommands::Delete { name, yes } => {
            if !yes && !confirm(&format!("Stop container and drop database '{}'?", name))? {
                println!("Aborted");
                return Ok(());
            }

            let (sink, printer) = console_sink();
            let result = workspace.databases().delete(&name, &sink).await;
            drop(sink);
            printer.await?;

            let status = result?;
            if !status.is_success() {
                bail!("dropdb failed ({})", status);
            }
        }
        DbCommands::Restore {
            project,
            backup,
            strict,
            yes,
        } => {
            let project = match project {
                Some(p) => p,
                None => {
                    let projects = workspace.projects()?;
                    projects[pick("Project", &projects)?].clone()
                }
            };
            workspace.require_project(&project)?;
            let archive = match backup {
                Some(path) => path,
                None => pick_backup(&workspace.backups()?)?,
            };

            let name = workspace.environment_name(&project);
            if !yes
                && !confirm(&format!(
                    "Replace database '{}' with {}?",
                    name,
                    archive.display()
                ))?
            {
                println!("Aborted");
                return Ok(());
            }

            let request = RestoreRequest { project, archive };
            let (sink, printer) = console_sink();
            let result = workspace.restore_sequence(strict).run(&request, &sink).await;
            drop(sink);
            printer.await?;

            let report = match result {
                Ok(report) => report,
                Err(failure) => {
                    if failure.report.touched_database() {
                        eprintln!(
                            "{} Database '{}' was dropped and may be incomplete",
                            "⚠".yellow(),
                            failure.report.environment
                        );
                    }
                    return Err(failure.into());
                }
            };
            for failed in report.failures() {
                if let Some(status) = failed.status {
                    println!("{} '{}' exited with {}", "⚠".yellow(), failed.step, status);
                }
            }
        }
    }

    Ok(())
}

fn handle_backups(workspace: &Workspace) -> Result<()> {
    let backups = workspace.backups()?;
    if backups.is_empty() {
        println!("No backups found");
    }
    for backup in backups {
        println!("{}", backup.display_name());
    }
    Ok(())
}

async fn handle_module(workspace: &Workspace, command: ModuleCommands) -> Result<()> {
    let (action, container, module) = command.parts();

    let (sink, printer) = console_sink();
    let result = workspace
        .docker()
        .run_module_action(action, container, module, &sink)
        .await;
    drop(sink);
    printer.await?;

    let status = result?;
    if !status.is_success() {
        bail!("odoo exited with {}", status);
    }
    Ok(())
}

fn handle_config(workspace: &Workspace, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::View => {
            let text = toml::to_string_pretty(workspace.config()).context("Failed to serialize config")?;
            println!("{}", text);
        }
        ConfigCommands::Path => {
            println!("{}", AppConfig::config_path()?.display());
        }
        ConfigCommands::Validate => {
            let errors = workspace.config().validate();
            if errors.is_empty() {
                println!("{} Configuration is valid", "✓".green());
            } else {
                for error in &errors {
                    println!("{} {}", "✗".red(), error);
                }
                bail!("{} configuration problem(s)", errors.len());
            }
        }
    }
    Ok(())
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    Ok(matches!(read_line()?.to_lowercase().as_str(), "y" | "yes"))
}

/// Numbered prompt over `items`, returning the chosen index
fn pick(what: &str, items: &[String]) -> Result<usize> {
    if items.is_empty() {
        bail!("No {} available", what.to_lowercase());
    }

    for (i, item) in items.iter().enumerate() {
        println!("{:>3}) {}", i + 1, item);
    }
    print!("{} number: ", what);
    io::stdout().flush()?;

    let choice: usize = read_line()?.parse().context("Not a number")?;
    if choice == 0 || choice > items.len() {
        bail!("No {} number {}", what.to_lowercase(), choice);
    }
    Ok(choice - 1)
}

fn pick_backup(backups: &[BackupArchive]) -> Result<PathBuf> {
    let labels: Vec<String> = backups.iter().map(|b| b.display_name()).collect();
    Ok(backups[pick("Backup", &labels)?].path.clone())
}
