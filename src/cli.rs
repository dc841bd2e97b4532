/// CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::ModuleAction;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "lgd-cli")]
#[command(author, version = VERSION_WITH_BUILD, about = "Manage the local Odoo development VM", long_about = None)]
pub struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the VM state
    Status,

    /// Start the VM (vagrant up)
    Up,

    /// Stop the VM (vagrant halt)
    Halt,

    /// Follow container logs
    Logs {
        /// Container name (main container when omitted)
        container: Option<String>,

        /// Number of lines to show before following
        #[arg(short = 'n', long)]
        tail: Option<usize>,
    },

    /// List running containers and their URLs
    Ports,

    /// Start, stop or restart a container
    Container {
        #[command(subcommand)]
        command: ContainerCommands,
    },

    /// List project folders
    Projects,

    /// Write the task file and open a project in the editor
    Open { project: String },

    /// Write the project's .vscode/tasks.json
    Tasks { project: String },

    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// List backup archives, newest first
    Backups,

    /// Odoo module operations
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ContainerCommands {
    Start { name: String },
    Stop { name: String },
    Restart { name: String },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// List databases
    List,

    /// Stop the matching container and drop a database
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Restore a backup archive into a project's database
    Restore {
        /// Project folder (prompted when omitted)
        #[arg(short, long)]
        project: Option<String>,

        /// Backup archive (prompted when omitted)
        #[arg(short, long)]
        backup: Option<PathBuf>,

        /// Abort on the first failing step
        #[arg(long)]
        strict: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Update a module (odoo -u)
    Update { container: String, module: String },

    /// Install a module (odoo -i)
    Install { container: String, module: String },
}

impl ModuleCommands {
    pub fn parts(&self) -> (ModuleAction, &str, &str) {
        match self {
            ModuleCommands::Update { container, module } => (ModuleAction::Update, container.as_str(), module.as_str()),
            ModuleCommands::Install { container, module } => (ModuleAction::Install, container.as_str(), module.as_str()),
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View configuration
    View,

    /// Print the config file location
    Path,

    /// Validate configuration
    Validate,
}
