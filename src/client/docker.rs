//! Docker Engine implementation of the runtime client

use super::{
    ClientError, ContainerInspection, ExitStatus, HostInfo, LogChunk, LogStream, PullProgress,
    RuntimeClient,
};
use crate::sandbox::spec::ContainerSpec;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, SystemInfo};
use bollard::Docker;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info};

/// Runtime client talking to the local Docker daemon
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect using `DOCKER_HOST` or the platform default socket
    pub async fn connect() -> Result<Self, ClientError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ClientError::Request(format!("Failed to connect to Docker: {}", e)))?;

        // Verify Docker is running
        docker
            .ping()
            .await
            .map_err(|e| ClientError::Request(format!("Docker daemon not available: {}", e)))?;

        debug!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    /// Wrap an existing bollard connection
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn info(&self) -> Result<HostInfo, ClientError> {
        let info = self.docker.info().await.map_err(map_error)?;
        Ok(host_info_from(info))
    }

    fn pull_image<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxStream<'a, Result<PullProgress, ClientError>> {
        let (from_image, tag) = split_reference(reference);
        info!("Pulling image {}:{}", from_image, tag);

        let options = CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, None)
            .map(|event| {
                event
                    .map(|info| PullProgress {
                        id: info.id,
                        status: info.status,
                        progress: info.progress,
                    })
                    .map_err(map_error)
            })
            .boxed()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ClientError> {
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config(spec))
            .await
            .map_err(map_error)?;

        for warning in &response.warnings {
            debug!("Docker warning for {}: {}", response.id, warning);
        }

        Ok(response.id)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, ClientError> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(map_error)?;

        Ok(inspection_from(response))
    }

    async fn start_container(&self, id: &str) -> Result<(), ClientError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_error)
    }

    async fn wait_container(&self, id: &str) -> Result<ExitStatus, ClientError> {
        let mut wait_stream = self.docker.wait_container(
            id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );

        match wait_stream.next().await {
            Some(Ok(response)) => Ok(ExitStatus {
                code: response.status_code,
                message: response.error.and_then(|e| e.message),
            }),
            // bollard reports a non-zero exit as an error; it is still an exit
            Some(Err(BollardError::DockerContainerWaitError { error, code })) => Ok(ExitStatus {
                code,
                message: Some(error).filter(|m| !m.is_empty()),
            }),
            Some(Err(e)) => Err(map_error(e)),
            None => Err(ClientError::Request(format!(
                "wait stream for container {} ended without a status",
                id
            ))),
        }
    }

    fn container_logs<'a>(&'a self, id: &'a str) -> BoxStream<'a, Result<LogChunk, ClientError>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        self.docker
            .logs(id, Some(options))
            .filter_map(|output| {
                future::ready(match output {
                    Ok(output) => log_chunk_from(output).map(Ok),
                    Err(e) => Some(Err(map_error(e))),
                })
            })
            .boxed()
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ClientError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_error)
    }
}

/// Build the engine request for a spec
fn container_config(spec: &ContainerSpec) -> Config<String> {
    let host_config = HostConfig {
        runtime: spec.runtime().map(str::to_string),
        security_opt: Some(spec.security_opts().to_vec()),
        ..Default::default()
    };

    let cmd = if spec.command().is_empty() {
        None
    } else {
        Some(spec.command().to_vec())
    };

    Config {
        image: Some(spec.image().to_string()),
        cmd,
        host_config: Some(host_config),
        tty: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        ..Default::default()
    }
}

fn host_info_from(info: SystemInfo) -> HostInfo {
    let runtimes = info
        .runtimes
        .unwrap_or_default()
        .into_iter()
        .map(|(name, runtime)| (name, runtime.path.unwrap_or_default()))
        .collect();

    HostInfo { runtimes }
}

fn inspection_from(response: ContainerInspectResponse) -> ContainerInspection {
    ContainerInspection {
        runtime: response.host_config.and_then(|host| host.runtime),
        running: response
            .state
            .and_then(|state| state.running)
            .unwrap_or(false),
    }
}

fn log_chunk_from(output: LogOutput) -> Option<LogChunk> {
    let (stream, message) = match output {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            (LogStream::Stdout, message)
        }
        LogOutput::StdErr { message } => (LogStream::Stderr, message),
        LogOutput::StdIn { .. } => return None,
    };

    Some(LogChunk {
        stream,
        bytes: message.to_vec(),
    })
}

/// Split `name[:tag]`, defaulting to `latest`; the engine pulls every tag otherwise
fn split_reference(reference: &str) -> (&str, &str) {
    if reference.contains('@') {
        return (reference, "");
    }

    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&reference[..split], &reference[split + 1..])
        }
        None => (reference, "latest"),
    }
}

fn map_error(e: BollardError) -> ClientError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => ClientError::NotFound(message),
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } => ClientError::Conflict(message),
        other => ClientError::Request(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfiguration;
    use bollard::models::{ContainerState, Runtime};
    use std::collections::HashMap;

    #[test]
    fn test_container_config_carries_runtime_and_security_opts() {
        let mut spec = ContainerSpec::new("alpine", vec!["echo".to_string(), "hello".to_string()]);
        spec.enforce(&SandboxConfiguration::new("runsc", "/usr/local/bin/runsc"));

        let config = container_config(&spec);
        let host = config.host_config.unwrap();
        assert_eq!(host.runtime.as_deref(), Some("runsc"));
        assert_eq!(
            host.security_opt,
            Some(vec!["no-new-privileges=true".to_string()])
        );
        assert_eq!(config.image.as_deref(), Some("alpine"));
        assert_eq!(
            config.cmd,
            Some(vec!["echo".to_string(), "hello".to_string()])
        );
    }

    #[test]
    fn test_empty_command_uses_image_default() {
        let spec = ContainerSpec::new("alpine", Vec::new());
        assert_eq!(container_config(&spec).cmd, None);
    }

    #[test]
    fn test_host_info_maps_runtime_paths() {
        let mut runtimes = HashMap::new();
        runtimes.insert(
            "runsc".to_string(),
            Runtime {
                path: Some("/usr/local/bin/runsc".to_string()),
                ..Default::default()
            },
        );
        runtimes.insert("broken".to_string(), Runtime::default());

        let info = host_info_from(SystemInfo {
            runtimes: Some(runtimes),
            ..Default::default()
        });

        assert_eq!(info.runtimes["runsc"], "/usr/local/bin/runsc");
        assert_eq!(info.runtimes["broken"], "");
    }

    #[test]
    fn test_inspection_reads_runtime_and_state() {
        let inspection = inspection_from(ContainerInspectResponse {
            host_config: Some(HostConfig {
                runtime: Some("runc".to_string()),
                ..Default::default()
            }),
            state: Some(ContainerState {
                running: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(inspection.runtime.as_deref(), Some("runc"));
        assert!(inspection.running);

        let empty = inspection_from(ContainerInspectResponse::default());
        assert_eq!(empty, ContainerInspection::default());
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("alpine"), ("alpine", "latest"));
        assert_eq!(split_reference("alpine:3.20"), ("alpine", "3.20"));
        assert_eq!(
            split_reference("docker.io/library/alpine"),
            ("docker.io/library/alpine", "latest")
        );
        assert_eq!(
            split_reference("localhost:5000/tools/alpine"),
            ("localhost:5000/tools/alpine", "latest")
        );
        assert_eq!(
            split_reference("localhost:5000/alpine:edge"),
            ("localhost:5000/alpine", "edge")
        );
        assert_eq!(
            split_reference("alpine@sha256:abc"),
            ("alpine@sha256:abc", "")
        );
    }

    #[test]
    fn test_error_mapping() {
        let not_found = map_error(BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        });
        assert_eq!(
            not_found,
            ClientError::NotFound("No such container: abc".to_string())
        );

        let conflict = map_error(BollardError::DockerResponseServerError {
            status_code: 409,
            message: "removal in progress".to_string(),
        });
        assert!(matches!(conflict, ClientError::Conflict(_)));

        let other = map_error(BollardError::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        });
        assert!(matches!(other, ClientError::Request(_)));
    }
}
