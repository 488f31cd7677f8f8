//! Sandbox Launcher
//!
//! Runs workload containers under a required sandbox runtime (gVisor by
//! default). The host is verified before anything is created, every created
//! container is re-inspected before it starts, and a monitor task samples the
//! runtime while the container runs.

#![deny(rust_2018_idioms)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod sandbox;
pub mod utils;

pub use client::{DockerClient, RuntimeClient};
pub use config::{LauncherConfig, SandboxConfiguration};
pub use error::{ProvisionFailure, Result, SandboxError, VerificationError};
pub use sandbox::{
    ContainerLauncher, LaunchReport, LaunchRequest, LifecycleCoordinator, SandboxVerifier,
    SecurityViolation, ViolationStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
