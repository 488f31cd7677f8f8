//! Error types for the sandbox launcher

use crate::client::ClientError;
use crate::sandbox::violation::SecurityViolation;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for launcher operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors that end a launch
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The host does not provide the required sandbox runtime
    #[error("Sandbox verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Image could not be fetched
    #[error("Failed to provision image {image}: {source}")]
    Provision {
        /// Image reference that was requested
        image: String,
        /// What went wrong while pulling
        #[source]
        source: ProvisionFailure,
    },

    /// The created container was assigned a different runtime than requested
    #[error(
        "Container {container_id} was created with runtime {} instead of {required}",
        runtime_label(.observed)
    )]
    InspectionMismatch {
        /// Container that was removed
        container_id: String,
        /// Runtime reported by inspection
        observed: Option<String>,
        /// Runtime that was requested
        required: String,
    },

    /// The runtime of a running container drifted
    #[error(transparent)]
    Violation(#[from] SecurityViolation),

    /// A runtime client call failed
    #[error("Container runtime error: {0}")]
    Transport(#[from] ClientError),

    /// The container did not finish within the configured deadline
    #[error("Container {container_id} did not finish within {seconds}s")]
    WaitTimeout {
        /// Container that was removed
        container_id: String,
        /// Configured deadline
        seconds: u64,
    },

    /// The launch was cancelled from outside
    #[error("Launch of container {0} was interrupted")]
    Interrupted(String),

    /// The monitor task ended abnormally
    #[error("Runtime monitor failed: {0}")]
    Monitor(String),

    /// A handle was used out of lifecycle order
    #[error("Invalid lifecycle transition: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Settings file could not be parsed as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings file could not be parsed as TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Platform not supported
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
}

impl SandboxError {
    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SandboxError::Violation(_) => 3,
            SandboxError::Verification(_) => 2,
            _ => 1,
        }
    }
}

/// Ways an image pull can fail
#[derive(Error, Debug)]
pub enum ProvisionFailure {
    /// The engine rejected or aborted the pull
    #[error(transparent)]
    Pull(#[from] ClientError),

    /// Progress could not be written out
    #[error("cannot write pull progress: {0}")]
    Progress(#[from] io::Error),
}

/// Reasons the host environment is unfit for sandboxed launches
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The sandbox binary is not on disk
    #[error("sandbox runtime binary not found at {}", .0.display())]
    BinaryMissing(PathBuf),

    /// The binary path could not be checked
    #[error("cannot check sandbox runtime binary at {}: {source}", .path.display())]
    BinaryUnreadable {
        /// Path that was checked
        path: PathBuf,
        /// Filesystem failure
        #[source]
        source: io::Error,
    },

    /// The runtime client could not report its runtimes
    #[error("failed to query container runtime: {0}")]
    HostQuery(#[source] ClientError),

    /// The runtime is not registered with the container engine
    #[error("runtime {0} is not registered with the container engine")]
    RuntimeNotRegistered(String),

    /// The registered runtime points to another binary
    #[error("runtime {name} is registered with path {registered} instead of {}", .expected.display())]
    RuntimePathMismatch {
        /// Runtime name
        name: String,
        /// Required binary path
        expected: PathBuf,
        /// Path reported by the engine
        registered: String,
    },
}

pub(crate) fn runtime_label(runtime: &Option<String>) -> &str {
    runtime.as_deref().unwrap_or("<none>")
}
