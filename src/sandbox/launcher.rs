//! Image provisioning, container creation and start under the sandbox runtime

use crate::client::{ClientError, RuntimeClient};
use crate::config::SandboxConfiguration;
use crate::error::{ProvisionFailure, Result, SandboxError};
use crate::sandbox::spec::{ContainerHandle, ContainerSpec, LifecycleState};
use crate::sandbox::verifier::VerifiedHost;
use futures::stream::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates containers that can only run under the verified sandbox runtime
pub struct ContainerLauncher<C> {
    client: Arc<C>,
    host: VerifiedHost,
}

impl<C: RuntimeClient> ContainerLauncher<C> {
    /// Launcher for a host that passed verification
    pub fn new(client: Arc<C>, host: VerifiedHost) -> Self {
        Self { client, host }
    }

    /// Shared runtime client
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Sandbox requirement every container is held to
    pub fn config(&self) -> &Arc<SandboxConfiguration> {
        self.host.config()
    }

    /// Pull `reference`, writing one line per progress event to `sink`
    pub async fn provision_image(
        &self,
        reference: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<()> {
        info!("Provisioning image: {}", reference);

        self.pull_with_progress(reference, sink)
            .await
            .map_err(|source| SandboxError::Provision {
                image: reference.to_string(),
                source,
            })
    }

    async fn pull_with_progress(
        &self,
        reference: &str,
        sink: &mut (dyn Write + Send),
    ) -> std::result::Result<(), ProvisionFailure> {
        let mut progress = self.client.pull_image(reference);
        while let Some(event) = progress.next().await {
            let event = event?;
            let line = [event.id, event.status, event.progress]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !line.is_empty() {
                writeln!(sink, "{}", line)?;
            }
        }
        sink.flush()?;

        Ok(())
    }

    /// Create a container from `spec` with the sandbox runtime forced on.
    ///
    /// `config` must be the configuration the host was verified against. The
    /// container is inspected straight away; if the engine assigned any other
    /// runtime it is removed and the launch fails.
    pub async fn create_container(
        &self,
        mut spec: ContainerSpec,
        config: &SandboxConfiguration,
    ) -> Result<ContainerHandle> {
        if config != self.config().as_ref() {
            return Err(SandboxError::Config(format!(
                "runtime {} at {} was not verified on this host",
                config.required_runtime_name(),
                config.required_binary_path().display()
            )));
        }

        spec.enforce(config);
        let required = config.required_runtime_name();

        info!(
            "Creating container from {} with runtime {}",
            spec.image(),
            required
        );
        let id = self.client.create_container(&spec).await?;
        let mut handle = ContainerHandle::new(id);
        debug!("Created container: {}", handle.id());

        let inspection = match self.client.inspect_container(handle.id()).await {
            Ok(inspection) => inspection,
            Err(e) => {
                self.fail(&mut handle).await;
                return Err(e.into());
            }
        };

        if inspection.runtime.as_deref() != Some(required) {
            warn!(
                "Container {} was assigned runtime {:?}, removing it",
                handle.id(),
                inspection.runtime
            );
            self.fail(&mut handle).await;
            return Err(SandboxError::InspectionMismatch {
                container_id: handle.id().to_string(),
                observed: inspection.runtime,
                required: required.to_string(),
            });
        }

        handle.transition(LifecycleState::Inspected)?;
        Ok(handle)
    }

    /// Start an inspected container; no retry on failure
    pub async fn start_container(&self, handle: &mut ContainerHandle) -> Result<()> {
        if handle.state() != LifecycleState::Inspected {
            return Err(SandboxError::InvalidState(format!(
                "container {} must be inspected before it starts, it is {}",
                handle.id(),
                handle.state()
            )));
        }

        info!("Starting container: {}", handle.id());
        if let Err(e) = self.client.start_container(handle.id()).await {
            self.fail(handle).await;
            return Err(e.into());
        }

        handle.transition(LifecycleState::Running)
    }

    /// Force-remove a container, tolerating one that is already gone
    pub async fn force_remove(&self, id: &str) {
        match self.client.remove_container(id, true).await {
            Ok(()) => info!("Removed container: {}", id),
            Err(ClientError::NotFound(_)) => debug!("Container {} already removed", id),
            Err(ClientError::Conflict(message)) => {
                debug!("Container {} is already being removed: {}", id, message)
            }
            Err(e) => warn!("Failed to remove container {}: {}", id, e),
        }
    }

    /// Mark a handle failed and tear its container down
    pub(crate) async fn fail(&self, handle: &mut ContainerHandle) {
        handle.mark_failed();
        self.force_remove(handle.id()).await;
    }
}
