//! Drives one launch from image pull to a resolved, cleaned-up outcome

use crate::client::{ClientError, ExitStatus, LogStream, RuntimeClient};
use crate::config::{LauncherConfig, LogSettings};
use crate::error::{Result, SandboxError};
use crate::sandbox::launcher::ContainerLauncher;
use crate::sandbox::monitor::{MonitorOutcome, RuntimeMonitor};
use crate::sandbox::spec::{ContainerHandle, ContainerSpec, LifecycleState};
use crate::sandbox::violation::ViolationStore;
use futures::stream::StreamExt;
use std::io::Write;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A workload to run in the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Image reference
    pub image: String,
    /// Command to run; empty means the image default
    pub command: Vec<String>,
    /// Pull the image before creating the container
    pub pull: bool,
}

impl LaunchRequest {
    /// Run `command` in `image`, pulling it first
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            image: image.into(),
            command,
            pull: true,
        }
    }
}

/// Container output captured after the launch resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLogs {
    /// Standard output bytes
    pub stdout: Vec<u8>,
    /// Standard error bytes
    pub stderr: Vec<u8>,
    /// Reading stopped at the byte limit or deadline
    pub truncated: bool,
}

impl CapturedLogs {
    /// Standard output as text
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error as text
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    fn len(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }
}

/// Result of a launch that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// Container that ran
    pub container_id: String,
    /// Exit code of the workload
    pub exit_code: i64,
    /// Captured output
    pub logs: CapturedLogs,
    /// Final lifecycle state
    pub state: LifecycleState,
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Runtime sampling interval
    pub monitor_interval: Duration,
    /// Optional deadline for the container to finish
    pub wait_timeout: Option<Duration>,
    /// Log retrieval limits
    pub logs: LogSettings,
    /// Remove the container after a normal exit
    pub remove_on_exit: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&LauncherConfig::default())
    }
}

impl From<&LauncherConfig> for CoordinatorSettings {
    fn from(config: &LauncherConfig) -> Self {
        Self {
            monitor_interval: config.monitor.interval(),
            wait_timeout: config.wait_timeout(),
            logs: config.logs.clone(),
            remove_on_exit: config.remove_on_exit,
        }
    }
}

/// What resolved the race; only the first signal counts
enum Resolution {
    Monitor(std::result::Result<MonitorOutcome, JoinError>),
    Exited(std::result::Result<ExitStatus, ClientError>),
    TimedOut(Duration),
    Interrupted,
}

/// Runs launches and guarantees cleanup on every outcome
pub struct LifecycleCoordinator<C> {
    launcher: ContainerLauncher<C>,
    settings: CoordinatorSettings,
    violations: ViolationStore,
}

impl<C: RuntimeClient> LifecycleCoordinator<C> {
    /// Create a coordinator around a launcher
    pub fn new(launcher: ContainerLauncher<C>, settings: CoordinatorSettings) -> Self {
        Self {
            launcher,
            settings,
            violations: ViolationStore::new(),
        }
    }

    /// Get the violation store
    pub fn violation_store(&self) -> &ViolationStore {
        &self.violations
    }

    /// Launch `request` and watch it until it resolves.
    ///
    /// Pull progress goes to `progress`. Cancelling `shutdown` resolves the
    /// launch as interrupted. Any container created along the way is removed
    /// before an error is returned.
    pub async fn run(
        &self,
        request: &LaunchRequest,
        progress: &mut (dyn Write + Send),
        shutdown: &CancellationToken,
    ) -> Result<LaunchReport> {
        info!("Launching {} in the sandbox", request.image);

        if request.pull {
            self.launcher.provision_image(&request.image, progress).await?;
        }

        let config = self.launcher.config().clone();
        let spec = ContainerSpec::new(request.image.clone(), request.command.clone());
        let mut handle = self.launcher.create_container(spec, &config).await?;

        if shutdown.is_cancelled() {
            self.launcher.fail(&mut handle).await;
            return Err(SandboxError::Interrupted(handle.id().to_string()));
        }

        self.launcher.start_container(&mut handle).await?;
        self.supervise(&mut handle, shutdown).await
    }

    /// Race the workload against its runtime monitor
    async fn supervise(
        &self,
        handle: &mut ContainerHandle,
        shutdown: &CancellationToken,
    ) -> Result<LaunchReport> {
        let id = handle.id().to_string();
        let client = self.launcher.client();
        let required = self.launcher.config().required_runtime_name().to_string();

        let scope = shutdown.child_token();
        // stops the monitor even if this future is dropped mid-race
        let _monitor_guard = scope.clone().drop_guard();
        let mut monitor = RuntimeMonitor::new(
            client.clone(),
            id.as_str(),
            required,
            self.settings.monitor_interval,
        )
        .spawn(scope.clone());

        let resolution = {
            let wait = client.wait_container(&id);
            let deadline = async {
                match self.settings.wait_timeout {
                    Some(timeout) => {
                        tokio::time::sleep(timeout).await;
                        timeout
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                outcome = &mut monitor => Resolution::Monitor(outcome),
                exit = wait => Resolution::Exited(exit),
                timeout = deadline => Resolution::TimedOut(timeout),
                _ = shutdown.cancelled() => Resolution::Interrupted,
            }
        };

        scope.cancel();
        if !matches!(resolution, Resolution::Monitor(_)) {
            match monitor.await {
                Ok(MonitorOutcome::Cancelled) => {}
                late => debug!("Ignoring monitor outcome after resolution: {:?}", late),
            }
        }
        debug!("Monitor for container {} stopped", id);

        match resolution {
            Resolution::Exited(Ok(status)) => self.complete(handle, status).await,
            Resolution::Monitor(Ok(MonitorOutcome::Violation(violation))) => {
                self.violations.add_violation(violation.clone());
                handle.transition(LifecycleState::Violated)?;
                self.teardown(handle).await;
                Err(SandboxError::Violation(violation))
            }
            Resolution::Monitor(Ok(MonitorOutcome::Cancelled)) | Resolution::Interrupted => {
                self.abort(handle, SandboxError::Interrupted(id)).await
            }
            Resolution::Monitor(Ok(MonitorOutcome::TransportError(e)))
            | Resolution::Exited(Err(e)) => self.abort(handle, SandboxError::Transport(e)).await,
            Resolution::Monitor(Err(e)) => {
                self.abort(handle, SandboxError::Monitor(e.to_string())).await
            }
            Resolution::TimedOut(timeout) => {
                let error = SandboxError::WaitTimeout {
                    container_id: id,
                    seconds: timeout.as_secs(),
                };
                self.abort(handle, error).await
            }
        }
    }

    async fn complete(
        &self,
        handle: &mut ContainerHandle,
        status: ExitStatus,
    ) -> Result<LaunchReport> {
        handle.transition(LifecycleState::Completed)?;
        info!(
            "Container {} exited with status {}",
            handle.id(),
            status.code
        );
        if let Some(message) = &status.message {
            warn!("Container {} reported: {}", handle.id(), message);
        }

        let logs = self.read_logs(handle.id()).await;
        if self.settings.remove_on_exit {
            self.launcher.force_remove(handle.id()).await;
        }

        Ok(LaunchReport {
            container_id: handle.id().to_string(),
            exit_code: status.code,
            logs: logs?,
            state: handle.state(),
        })
    }

    async fn abort(
        &self,
        handle: &mut ContainerHandle,
        error: SandboxError,
    ) -> Result<LaunchReport> {
        handle.transition(LifecycleState::Failed)?;
        warn!("Launch of container {} failed: {}", handle.id(), error);
        self.teardown(handle).await;
        Err(error)
    }

    /// Keep what output there is, then remove the container
    async fn teardown(&self, handle: &ContainerHandle) {
        match self.read_logs(handle.id()).await {
            Ok(logs) => {
                if !logs.stdout.is_empty() || !logs.stderr.is_empty() {
                    info!(
                        "Output of container {} before teardown:\n{}{}",
                        handle.id(),
                        logs.stdout_lossy(),
                        logs.stderr_lossy()
                    );
                }
            }
            Err(e) => debug!("No logs for container {}: {}", handle.id(), e),
        }
        self.launcher.force_remove(handle.id()).await;
    }

    /// Read logs up to the configured byte limit and deadline
    async fn read_logs(&self, id: &str) -> Result<CapturedLogs> {
        let limits = &self.settings.logs;
        let mut logs = CapturedLogs::default();
        let mut stream = self.launcher.client().container_logs(id);

        let drained = tokio::time::timeout(limits.read_timeout(), async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                let room = limits.max_bytes.saturating_sub(logs.len());
                let take = chunk.bytes.len().min(room);
                let target = match chunk.stream {
                    LogStream::Stdout => &mut logs.stdout,
                    LogStream::Stderr => &mut logs.stderr,
                };
                target.extend_from_slice(&chunk.bytes[..take]);
                if take < chunk.bytes.len() || logs.len() >= limits.max_bytes {
                    return Ok(true);
                }
            }
            Ok::<_, ClientError>(false)
        })
        .await;

        logs.truncated = match drained {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Stopped reading logs of container {} after {:?}",
                    id,
                    limits.read_timeout()
                );
                true
            }
        };

        Ok(logs)
    }
}
