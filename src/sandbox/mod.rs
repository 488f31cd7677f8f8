//! Sandboxed container launch: verification, creation, monitoring and coordination

pub mod coordinator;
pub mod launcher;
pub mod monitor;
pub mod spec;
pub mod verifier;
pub mod violation;

pub use coordinator::{
    CapturedLogs, CoordinatorSettings, LaunchReport, LaunchRequest, LifecycleCoordinator,
};
pub use launcher::ContainerLauncher;
pub use monitor::{MonitorOutcome, RuntimeMonitor};
pub use spec::{ContainerHandle, ContainerSpec, LifecycleState};
pub use verifier::{SandboxVerifier, VerifiedHost};
pub use violation::{SecurityViolation, ViolationStore};
