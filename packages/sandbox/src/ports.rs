// ABOUTME: Stable host port allocation per team
// ABOUTME: Lets Docker pick an ephemeral port once, then persists it on the team record

use crate::docker_cli::{is_no_such_container, DockerCli};
use crate::error::{Result, SandboxError};
use crate::manager::sandbox_name;
use crate::storage::TeamStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Port the baseline image listens on
const BASELINE_INTERNAL_PORT: u16 = 3000;

pub struct PortRegistry {
    docker: DockerCli,
    teams: Arc<dyn TeamStore>,
    namespace: String,
    baseline_image: String,
}

impl PortRegistry {
    pub fn new(
        docker: DockerCli,
        teams: Arc<dyn TeamStore>,
        namespace: String,
        baseline_image: String,
    ) -> Self {
        Self {
            docker,
            teams,
            namespace,
            baseline_image,
        }
    }

    /// Host port of `team_id`, allocating and persisting one on first call
    pub async fn assign(&self, team_id: i64) -> Result<u16> {
        let team = self.teams.get_team(team_id).await?;
        if let Some(port) = team.port {
            return Ok(port);
        }

        let name = sandbox_name(&self.namespace, &team.team_name, team_id);
        let output = self
            .docker
            .run_ephemeral(&name, BASELINE_INTERNAL_PORT, &self.baseline_image)
            .await?;

        if is_no_such_container(&output.output) {
            return Err(SandboxError::NotFound(output.output.trim().to_string()));
        }
        if !output.success() {
            return Err(SandboxError::Unknown(format!(
                "Baseline container for team {} failed to start: {}",
                team_id,
                output.output.trim()
            )));
        }

        let port = match self.docker.port(&name).await {
            Ok(port) => port,
            Err(e) => {
                self.discard_baseline(&name).await;
                return Err(SandboxError::Wrong(format!(
                    "Could not read host port of {}: {}",
                    name, e
                )));
            }
        };

        if let Err(e) = self.teams.set_port(team_id, port).await {
            self.discard_baseline(&name).await;
            return Err(e.into());
        }

        info!("Assigned host port {} to team {}", port, team_id);
        Ok(port)
    }

    /// Frees the sandbox name so a later assignment can start over
    async fn discard_baseline(&self, name: &str) {
        for (step, result) in [
            ("stop", self.docker.stop(name).await),
            ("rm", self.docker.remove_container(name).await),
        ] {
            match result {
                Ok(output) if output.success() => {}
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
    }
}
