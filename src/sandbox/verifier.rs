//! Pre-flight check that the sandbox runtime is installed and registered

use crate::client::{HostFilesystem, LocalFilesystem, RuntimeClient};
use crate::config::SandboxConfiguration;
use crate::error::VerificationError;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Proof that the host passed verification.
///
/// Only [`SandboxVerifier`] can produce one, and a launcher can only be built
/// from one.
#[derive(Debug, Clone)]
pub struct VerifiedHost {
    config: Arc<SandboxConfiguration>,
}

impl VerifiedHost {
    /// The configuration that was verified
    pub fn config(&self) -> &Arc<SandboxConfiguration> {
        &self.config
    }
}

/// Checks the host before anything is created
#[derive(Debug, Default)]
pub struct SandboxVerifier<F = LocalFilesystem> {
    filesystem: F,
}

impl SandboxVerifier {
    /// Verifier reading the local filesystem
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: HostFilesystem> SandboxVerifier<F> {
    /// Verifier reading `filesystem`
    pub fn with_filesystem(filesystem: F) -> Self {
        Self { filesystem }
    }

    /// Confirm the sandbox binary exists and the engine runs it under the required name.
    ///
    /// Checks short-circuit in order: binary on disk, runtime registered,
    /// registered path equal to the required one. Nothing is retried.
    pub async fn verify_host_environment<C>(
        &self,
        client: &C,
        config: Arc<SandboxConfiguration>,
    ) -> Result<VerifiedHost, VerificationError>
    where
        C: RuntimeClient + ?Sized,
    {
        let binary = config.required_binary_path();
        self.check_binary(binary).await?;

        let info = client
            .info()
            .await
            .map_err(VerificationError::HostQuery)?;

        let name = config.required_runtime_name();
        let registered = info
            .runtimes
            .get(name)
            .ok_or_else(|| VerificationError::RuntimeNotRegistered(name.to_string()))?;

        if binary.as_os_str() != registered.as_str() {
            return Err(VerificationError::RuntimePathMismatch {
                name: name.to_string(),
                expected: binary.to_path_buf(),
                registered: registered.clone(),
            });
        }

        info!("Sandbox runtime {} verified at {}", name, binary.display());
        Ok(VerifiedHost { config })
    }

    async fn check_binary(&self, binary: &Path) -> Result<(), VerificationError> {
        debug!("Checking sandbox binary at {}", binary.display());
        match self.filesystem.exists(binary).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerificationError::BinaryMissing(binary.to_path_buf())),
            Err(source) => Err(VerificationError::BinaryUnreadable {
                path: binary.to_path_buf(),
                source,
            }),
        }
    }
}
