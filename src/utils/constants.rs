/// LGD environment constants
///
/// Defaults mirror the layout of the shared Vagrant development box

pub const APP_NAME: &str = "lgd-cli";

/// Environment variables
pub const DEVELOPER_ENV: &str = "USERDEV";
pub const CONFIG_DIR_ENV: &str = "LGD_CONFIG_DIR";
pub const LOG_FILTER_ENV: &str = "LGD_LOG";

/// Fallback developer identifier when USERDEV is unset
pub const DEFAULT_DEVELOPER: &str = "controlcdms-gh";

/// Literal joining project and developer in container/database names
pub const ENVIRONMENT_INFIX: &str = "-local-";

// Host side
pub const DEFAULT_DEV_DIR: &str = "dev";
pub const STAGING_DIR_NAME: &str = "temp";
pub const DEFAULT_BACKUP_EXTENSION: &str = "zip";
pub const DEFAULT_EDITOR: &str = "code";
pub const MAX_RECENT_PROJECTS: usize = 10;

// VM side
pub const DEFAULT_VM_IP: &str = "192.168.56.10";
pub const DEFAULT_VM_DEV_DIR: &str = "/home/vagrant/dev";
pub const DEFAULT_FILESTORE_ROOT: &str = "/opt/odoo/staging";

// Containers
pub const DEFAULT_DB_CONTAINER: &str = "ldb";
pub const DEFAULT_DB_USER: &str = "odoo";
pub const DEFAULT_MAIN_CONTAINER: &str = "lgdoo";
pub const DEFAULT_LOG_TAIL: usize = 300;

// Backup archive layout
pub const DUMP_FILE_NAME: &str = "dump.sql";
pub const FILESTORE_DIR_NAME: &str = "filestore";
/// Where the dump is copied inside the database container
pub const CONTAINER_DUMP_PATH: &str = "/tmp/dump.sql";

// Editor task file
pub const TASKS_DIR_NAME: &str = ".vscode";
pub const TASKS_FILE_NAME: &str = "tasks.json";
pub const TASKS_VERSION: &str = "2.0.0";
pub const TASK_LABEL_START: &str = "🚀 Start Odoo Container";
pub const TASK_LABEL_RESTART: &str = "🔁 Restart Odoo Container";
pub const TASK_LABEL_STOP: &str = "⏹️ Stop Odoo Container";
