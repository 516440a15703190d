// ABOUTME: Sandbox execution engine turning a team project into a running container
// ABOUTME: Classifies the project, writes its Dockerfile and drives the docker lifecycle

pub mod classifier;
pub mod config;
pub mod docker_cli;
pub mod dockerfile;
pub mod error;
pub mod manager;
pub mod ports;
pub mod runner;
pub mod scheduler;
pub mod storage;

pub use classifier::{Classification, ProjectClassifier, ProjectType};
pub use config::EngineConfig;
pub use docker_cli::DockerCli;
pub use dockerfile::{DockerfileSynthesizer, SandboxPaths};
pub use error::{ErrorKind, Result, ResultCode, SandboxError};
pub use manager::{
    sandbox_name, CompileOutcome, CompileRequest, SandboxManager, StopRequest, SweepReport,
};
pub use ports::PortRegistry;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use scheduler::CleanupScheduler;
pub use storage::{FileCatalog, FileRecord, SqliteStore, StorageError, Team, TeamStore};
