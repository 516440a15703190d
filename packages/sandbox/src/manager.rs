// ABOUTME: Sandbox lifecycle manager orchestrating classification, synthesis and docker operations
// ABOUTME: Serializes work per team and gates the global sweep against in-flight compiles

use crate::classifier::{ProjectClassifier, ProjectType};
use crate::config::EngineConfig;
use crate::docker_cli::{is_no_such_container, DockerCli};
use crate::dockerfile::{DockerfileSynthesizer, SandboxPaths};
use crate::error::{Result, SandboxError};
use crate::ports::PortRegistry;
use crate::runner::{CommandOutput, CommandRunner};
use crate::storage::{FileCatalog, TeamStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Compile request as sent by the IDE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    /// `teamId/projectName/...`, relative to the base root
    pub file_path: String,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequest {
    #[serde(rename = "teamName")]
    pub team_name: String,
    #[serde(rename = "teamSeq", alias = "teamId")]
    pub team_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutcome {
    pub project_type: ProjectType,
    /// Script output, or the reachable address of a service
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub containers_found: usize,
    pub containers_stopped: usize,
    pub errors: usize,
    pub pruned: bool,
}

/// Container and image name for a team.
///
/// The team name is lowercased with whitespace removed; characters Docker
/// rejects in names or tags are dropped. Runs of `.`, `_` and `-` collapse to
/// their first character and are trimmed from both ends.
pub fn sandbox_name(namespace: &str, team_name: &str, team_id: i64) -> String {
    let mut sanitized = String::with_capacity(team_name.len());
    for c in team_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
    {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c);
        } else if matches!(c, '_' | '.' | '-')
            && sanitized.chars().last().is_some_and(|p| p.is_ascii_alphanumeric())
        {
            sanitized.push(c);
        }
    }
    let sanitized = sanitized.trim_end_matches(['_', '.', '-']);
    format!("{}{}_{}", namespace, sanitized, team_id)
}

/// Sandbox lifecycle manager
pub struct SandboxManager {
    config: EngineConfig,
    paths: SandboxPaths,
    docker: DockerCli,
    teams: Arc<dyn TeamStore>,
    files: Arc<dyn FileCatalog>,
    synthesizer: DockerfileSynthesizer,
    ports: PortRegistry,
    team_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    sweep_gate: RwLock<()>,
}

impl SandboxManager {
    pub fn new(
        config: EngineConfig,
        runner: Arc<dyn CommandRunner>,
        teams: Arc<dyn TeamStore>,
        files: Arc<dyn FileCatalog>,
    ) -> Self {
        let paths = SandboxPaths::new(config.base_root.clone());
        let docker = DockerCli::new(runner, config.command_timeout, config.build_timeout);
        let synthesizer =
            DockerfileSynthesizer::new(paths.clone(), files.clone(), config.base_image.clone());
        let ports = PortRegistry::new(
            docker.clone(),
            teams.clone(),
            config.namespace.clone(),
            config.baseline_image.clone(),
        );

        Self {
            config,
            paths,
            docker,
            teams,
            files,
            synthesizer,
            ports,
            team_locks: Mutex::new(HashMap::new()),
            sweep_gate: RwLock::new(()),
        }
    }

    async fn team_lock(&self, team_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.team_locks.lock().await;
        locks
            .entry(team_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Rebuild and start the sandbox for the team owning `request.file_path`
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome> {
        let (team_id, project_root, requested_file) =
            self.paths.resolve_request(&request.file_path)?;

        let team = self.teams.get_team(team_id).await?;
        let host_port = team.port.ok_or_else(|| {
            SandboxError::NotFound(format!("Team {} has no assigned port", team_id))
        })?;

        let classification = ProjectClassifier::classify(&project_root, &requested_file).await?;
        self.teams
            .set_project_type(team_id, classification.project_type)
            .await?;

        let name = sandbox_name(&self.config.namespace, &team.team_name, team_id);
        let team_root = self.paths.team_root(team_id);

        let _gate = self.sweep_gate.read().await;
        let lock = self.team_lock(team_id).await;
        let _guard = lock.lock().await;

        info!(
            "Compiling {} sandbox {} from {}",
            classification.project_type,
            name,
            classification.entry_path.display()
        );

        if let Err(e) = self.teardown_locked(team_id, &name).await {
            warn!("Teardown before rebuilding {} failed: {}", name, e);
        }

        self.synthesizer
            .synthesize(team_id, &classification, request.input.as_deref())
            .await?;

        let build = self.docker.build(&name, &team_root).await?;
        if build.output.trim().is_empty() {
            error!("Image build for {} produced no output", name);
            return Err(SandboxError::Unknown(format!(
                "Image build for {} produced no output",
                name
            )));
        }
        if !build.success() {
            error!("Image build for {} failed", name);
            return Err(SandboxError::Unknown(build.output));
        }

        let project_type = classification.project_type;
        let run = self
            .docker
            .run(&name, &team_root, host_port, project_type.internal_port())
            .await?;
        if !run.success() {
            if is_no_such_container(&run.output) {
                return Err(SandboxError::NotFound(run.output.trim().to_string()));
            }
            return Err(SandboxError::Unknown(run.output));
        }

        let response = if project_type.is_service() {
            self.service_address(&name, host_port, run).await
        } else {
            self.script_output(&name).await?
        };

        Ok(CompileOutcome {
            project_type,
            response,
        })
    }

    async fn script_output(&self, name: &str) -> Result<String> {
        let logs = match self
            .docker
            .logs_follow(name, self.config.script_timeout)
            .await
        {
            Ok(logs) => logs,
            Err(SandboxError::Timeout(msg)) => {
                warn!("Script sandbox {} timed out, stopping it", name);
                self.best_effort("stop", name, self.docker.stop(name).await);
                return Err(SandboxError::Timeout(msg));
            }
            Err(e) => return Err(e),
        };

        let prefix = format!("{}/", self.config.base_root.display());
        Ok(logs.output.replace(&prefix, ""))
    }

    async fn service_address(&self, name: &str, host_port: u16, run: CommandOutput) -> String {
        match self.docker.port(name).await {
            Ok(port) if port == host_port => format!("{}:{}", self.config.public_host, port),
            Ok(port) => {
                warn!(
                    "Sandbox {} bound port {} instead of {}",
                    name, port, host_port
                );
                run.output
            }
            Err(e) => {
                warn!("Could not inspect ports of {}: {}", name, e);
                run.output
            }
        }
    }

    /// Tear down the sandbox named by `request`
    pub async fn stop(&self, request: &StopRequest) -> Result<()> {
        self.teardown(request.team_id, &request.team_name).await
    }

    pub async fn teardown(&self, team_id: i64, team_name: &str) -> Result<()> {
        let name = sandbox_name(&self.config.namespace, team_name, team_id);

        let _gate = self.sweep_gate.read().await;
        let lock = self.team_lock(team_id).await;
        let _guard = lock.lock().await;

        self.teardown_locked(team_id, &name).await
    }

    /// Caller must hold the team lock
    async fn teardown_locked(&self, team_id: i64, name: &str) -> Result<()> {
        debug!("Tearing down sandbox {}", name);

        self.best_effort("stop", name, self.docker.stop(name).await);
        self.best_effort("rm", name, self.docker.remove_container(name).await);
        self.best_effort("rmi", name, self.docker.remove_image(name).await);

        let dockerfile = self.paths.dockerfile_path(team_id);
        let path = dockerfile.to_string_lossy();
        if !self.files.unregister(team_id, &path).await? {
            debug!("No catalog record for {}", path);
        }

        match tokio::fs::remove_file(&dockerfile).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(SandboxError::Unknown(format!(
                    "Failed to remove {}: {}",
                    path, e
                )))
            }
        }

        Ok(())
    }

    fn best_effort(&self, step: &str, name: &str, result: Result<CommandOutput>) {
        match result {
            Ok(output) if output.success() => debug!("docker {} {} done", step, name),
            Ok(output) => warn!(
                "docker {} {} exited with {:?}: {}",
                step,
                name,
                output.exit_code,
                output.output.trim()
            ),
            Err(e) => warn!("docker {} {} failed: {}", step, name, e),
        }
    }

    /// Host port of the team, allocated on first call
    pub async fn register_port(&self, team_id: i64) -> Result<u16> {
        let _gate = self.sweep_gate.read().await;
        let lock = self.team_lock(team_id).await;
        let _guard = lock.lock().await;

        self.ports.assign(team_id).await
    }

    /// Stop every namespaced container and prune unused images
    pub async fn sweep(&self) -> SweepReport {
        let _gate = self.sweep_gate.write().await;
        let mut report = SweepReport::default();

        info!("Starting sandbox sweep");

        match self.docker.list_containers(&self.config.namespace).await {
            Ok(containers) => {
                report.containers_found = containers.len();
                for id in &containers {
                    match self.docker.stop(id).await {
                        Ok(output) if output.success() => report.containers_stopped += 1,
                        Ok(output) => {
                            warn!("Failed to stop {}: {}", id, output.output.trim());
                            report.errors += 1;
                        }
                        Err(e) => {
                            warn!("Failed to stop {}: {}", id, e);
                            report.errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to list sandbox containers: {}", e);
                report.errors += 1;
            }
        }

        match self.docker.prune_images().await {
            Ok(output) if output.success() => report.pruned = true,
            Ok(output) => {
                warn!("Image prune failed: {}", output.output.trim());
                report.errors += 1;
            }
            Err(e) => {
                warn!("Image prune failed: {}", e);
                report.errors += 1;
            }
        }

        info!(
            "Sweep finished: {}/{} containers stopped, {} errors",
            report.containers_stopped, report.containers_found, report.errors
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_name_sanitizes_team_name() {
        assert_eq!(
            sandbox_name("crowstudio_", "Blue Whale", 7),
            "crowstudio_bluewhale_7"
        );
        assert_eq!(
            sandbox_name("crowstudio_", "  Team\tX!/", 12),
            "crowstudio_teamx_12"
        );
    }

    #[test]
    fn test_sandbox_name_collapses_separators() {
        assert_eq!(sandbox_name("crowstudio_", "Team-", 7), "crowstudio_team_7");
        assert_eq!(
            sandbox_name("crowstudio_", "-a..b--_c_", 3),
            "crowstudio_a.b-c_3"
        );
        assert_eq!(sandbox_name("crowstudio_", "x - y", 1), "crowstudio_x-y_1");
    }

    #[test]
    fn test_stop_request_accepts_both_id_keys() {
        let a: StopRequest =
            serde_json::from_str(r#"{"teamName":"alpha","teamSeq":3}"#).unwrap();
        let b: StopRequest = serde_json::from_str(r#"{"teamName":"alpha","teamId":3}"#).unwrap();
        assert_eq!(a.team_id, 3);
        assert_eq!(b.team_id, 3);
    }

    #[test]
    fn test_compile_request_input_is_optional() {
        let req: CompileRequest = serde_json::from_str(r#"{"filePath":"1/demo/main.py"}"#).unwrap();
        assert_eq!(req.input, None);
    }
}
