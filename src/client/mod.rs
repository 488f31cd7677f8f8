//! Container runtime client abstraction
//!
//! The launcher never talks to a container engine directly. Everything goes
//! through [`RuntimeClient`], which the coordinator and the runtime monitor
//! call concurrently through a shared `Arc`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub mod docker;

pub use docker::DockerClient;

use crate::sandbox::spec::ContainerSpec;

/// Errors reported by a runtime client call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The container or image does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The engine refused the request because of the object's current state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other transport or engine failure
    #[error("{0}")]
    Request(String),
}

/// Runtimes the engine has registered, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Registered runtime name to binary path
    pub runtimes: HashMap<String, String>,
}

/// One event of an image pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullProgress {
    /// Layer or image id the event refers to
    pub id: Option<String>,
    /// Status text
    pub status: Option<String>,
    /// Progress bar text
    pub progress: Option<String>,
}

/// What inspection reports about a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInspection {
    /// Runtime the container actually runs under
    pub runtime: Option<String>,
    /// Whether the container process is running
    pub running: bool,
}

/// Result of waiting for a container to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code of the container's main process
    pub code: i64,
    /// Error message reported by the engine alongside the exit
    pub message: Option<String>,
}

/// Output stream a log chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// A chunk of container output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    /// Stream the bytes were written to
    pub stream: LogStream,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

/// Operations the launcher needs from a container engine.
///
/// Implementations must tolerate concurrent calls from several tasks.
#[async_trait]
pub trait RuntimeClient: Send + Sync + 'static {
    /// Report the registered runtimes
    async fn info(&self) -> Result<HostInfo, ClientError>;

    /// Pull an image, yielding progress events
    fn pull_image<'a>(&'a self, reference: &'a str)
        -> BoxStream<'a, Result<PullProgress, ClientError>>;

    /// Create a container and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ClientError>;

    /// Inspect a container
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, ClientError>;

    /// Start a created container
    async fn start_container(&self, id: &str) -> Result<(), ClientError>;

    /// Wait until the container is no longer running
    async fn wait_container(&self, id: &str) -> Result<ExitStatus, ClientError>;

    /// Stream stdout and stderr of a container
    fn container_logs<'a>(&'a self, id: &'a str) -> BoxStream<'a, Result<LogChunk, ClientError>>;

    /// Remove a container
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ClientError>;
}

/// Read-only view of the host filesystem
#[async_trait]
pub trait HostFilesystem: Send + Sync {
    /// Whether something exists at `path`
    async fn exists(&self, path: &Path) -> std::io::Result<bool>;
}

/// [`HostFilesystem`] backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

#[async_trait]
impl HostFilesystem for LocalFilesystem {
    async fn exists(&self, path: &Path) -> std::io::Result<bool> {
        tokio::fs::try_exists(path).await
    }
}

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_filesystem_exists() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("runsc");
        std::fs::write(&binary, b"#!/bin/sh\n").unwrap();

        assert!(LocalFilesystem.exists(&binary).await.unwrap());
        assert!(!LocalFilesystem.exists(&dir.path().join("missing")).await.unwrap());
    }
}
