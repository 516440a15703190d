// ABOUTME: Docker CLI wrapper functions for sandbox image and container management
// ABOUTME: Builds the literal docker argument vectors and interprets their output

use crate::error::{Result, SandboxError};
use crate::runner::{CommandOutput, CommandRunner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const NO_SUCH_CONTAINER: &str = "Error: No such container";

/// Docker commands issued by the engine, one method per argument vector
#[derive(Clone)]
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
    command_timeout: Duration,
    build_timeout: Duration,
}

impl DockerCli {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        command_timeout: Duration,
        build_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            command_timeout,
            build_timeout,
        }
    }

    async fn docker(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("docker".to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        self.runner.run(&argv, timeout).await
    }

    /// `docker build -t <name> <projectPath>/`
    pub async fn build(&self, name: &str, context_dir: &Path) -> Result<CommandOutput> {
        let context = format!("{}/", context_dir.display());
        self.docker(&["build", "-t", name, &context], self.build_timeout)
            .await
    }

    /// `docker run -d --name <name> -v <path>:<path> -p <host>:<internal> <name>`
    pub async fn run(
        &self,
        name: &str,
        project_dir: &Path,
        host_port: u16,
        internal_port: u16,
    ) -> Result<CommandOutput> {
        let volume = format!("{0}:{0}", project_dir.display());
        let ports = format!("{}:{}", host_port, internal_port);
        self.docker(
            &["run", "-d", "--name", name, "-v", &volume, "-p", &ports, name],
            self.command_timeout,
        )
        .await
    }

    /// Baseline run without a host port so Docker picks an ephemeral one
    pub async fn run_ephemeral(
        &self,
        name: &str,
        internal_port: u16,
        image: &str,
    ) -> Result<CommandOutput> {
        let port = internal_port.to_string();
        self.docker(
            &["run", "-d", "--name", name, "-p", &port, image],
            self.command_timeout,
        )
        .await
    }

    /// `docker logs -f <name>`, bounded by `timeout`
    pub async fn logs_follow(&self, name: &str, timeout: Duration) -> Result<CommandOutput> {
        self.docker(&["logs", "-f", name], timeout).await
    }

    /// `docker port <name>`, returning the first bound host port
    pub async fn port(&self, name: &str) -> Result<u16> {
        let output = self.docker(&["port", name], self.command_timeout).await?;
        parse_host_port(&output.output)
    }

    pub async fn stop(&self, name: &str) -> Result<CommandOutput> {
        self.docker(&["stop", name], self.command_timeout).await
    }

    pub async fn remove_container(&self, name: &str) -> Result<CommandOutput> {
        self.docker(&["rm", name], self.command_timeout).await
    }

    pub async fn remove_image(&self, name: &str) -> Result<CommandOutput> {
        self.docker(&["rmi", name], self.command_timeout).await
    }

    /// IDs of running containers whose name carries `namespace`
    pub async fn list_containers(&self, namespace: &str) -> Result<Vec<String>> {
        let filter = format!("--filter=name={}", namespace);
        let output = self
            .docker(&["container", "ls", &filter, "-q"], self.command_timeout)
            .await?;

        if !output.success() {
            return Err(SandboxError::Unknown(format!(
                "docker container ls failed: {}",
                output.output.trim()
            )));
        }

        Ok(output
            .output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// `docker image prune -a -f`
    pub async fn prune_images(&self) -> Result<CommandOutput> {
        self.docker(&["image", "prune", "-a", "-f"], self.build_timeout)
            .await
    }
}

/// Whether docker reported the named container as absent
pub fn is_no_such_container(output: &str) -> bool {
    output.trim_start().starts_with(NO_SUCH_CONTAINER)
}

/// Parse `docker port` output such as `3000/tcp -> 0.0.0.0:49153`
pub fn parse_host_port(output: &str) -> Result<u16> {
    if is_no_such_container(output) {
        return Err(SandboxError::NotFound(output.trim().to_string()));
    }

    let first = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| SandboxError::Wrong("docker port returned no mappings".to_string()))?;

    first
        .rsplit(':')
        .next()
        .and_then(|port| port.trim().parse::<u16>().ok())
        .ok_or_else(|| SandboxError::Wrong(format!("Unparseable port mapping: {}", first)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port_ipv4() {
        let port = parse_host_port("3000/tcp -> 0.0.0.0:49153\n3000/tcp -> [::]:49153\n").unwrap();
        assert_eq!(port, 49153);
    }

    #[test]
    fn test_parse_host_port_ipv6_first() {
        assert_eq!(parse_host_port("8000/tcp -> [::]:32768").unwrap(), 32768);
    }

    #[test]
    fn test_parse_host_port_missing_container() {
        let result = parse_host_port("Error: No such container: crowstudio_demo_1\n");
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
    }

    #[test]
    fn test_parse_host_port_garbage() {
        assert!(matches!(parse_host_port(""), Err(SandboxError::Wrong(_))));
        assert!(matches!(
            parse_host_port("no mapping here"),
            Err(SandboxError::Wrong(_))
        ));
    }
}
