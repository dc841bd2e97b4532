pub mod backup;
pub mod databases;
pub mod docker;
pub mod environment;
pub mod output;
pub mod projects;
pub mod restore;
pub mod shell;
pub mod tasks;
pub mod vagrant;
pub mod workspace;

pub use databases::DatabaseManager;
pub use docker::{ContainerInfo, DockerManager, ModuleAction};
pub use environment::EnvironmentName;
pub use output::{OutputEvent, OutputSink};
pub use restore::{RestoreFailure, RestoreReport, RestoreRequest, RestoreSequence};
pub use shell::{Shell, SystemShell};
pub use vagrant::{VagrantManager, VmState};
pub use workspace::Workspace;
