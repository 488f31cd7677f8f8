//! Container specifications and handles

use crate::config::SandboxConfiguration;
use std::fmt;

/// Security option that stops processes from gaining privileges
pub const NO_NEW_PRIVILEGES: &str = "no-new-privileges=true";

/// What to run inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    image: String,
    command: Vec<String>,
    runtime: Option<String>,
    security_opts: Vec<String>,
}

impl ContainerSpec {
    /// Describe a container running `command` in `image`
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            image: image.into(),
            command,
            runtime: None,
            security_opts: Vec::new(),
        }
    }

    /// Image reference
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Command to run; empty means the image default
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Host-level runtime the container is declared with
    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    /// Security options passed to the engine
    pub fn security_opts(&self) -> &[String] {
        &self.security_opts
    }

    /// Force the sandbox runtime and disable privilege escalation
    pub(crate) fn enforce(&mut self, config: &SandboxConfiguration) {
        self.runtime = Some(config.required_runtime_name().to_string());
        if !self.security_opts.iter().any(|opt| opt == NO_NEW_PRIVILEGES) {
            self.security_opts.push(NO_NEW_PRIVILEGES.to_string());
        }
    }
}

/// Where a container is in its launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created but not yet checked
    Created,
    /// Inspection confirmed the sandbox runtime
    Inspected,
    /// Started and watched by the runtime monitor
    Running,
    /// Exited on its own
    Completed,
    /// Removed after a runtime violation
    Violated,
    /// Removed after an operational failure
    Failed,
}

impl LifecycleState {
    /// Whether the launch has resolved
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Completed | LifecycleState::Violated | LifecycleState::Failed
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Inspected => "inspected",
            LifecycleState::Running => "running",
            LifecycleState::Completed => "completed",
            LifecycleState::Violated => "violated",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A container owned by one launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    id: String,
    state: LifecycleState,
}

impl ContainerHandle {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            state: LifecycleState::Created,
        }
    }

    /// Engine-assigned container id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: LifecycleState) -> crate::Result<()> {
        use LifecycleState::*;

        let allowed = matches!(
            (self.state, next),
            (Created, Inspected)
                | (Created, Failed)
                | (Inspected, Running)
                | (Inspected, Failed)
                | (Running, Completed)
                | (Running, Violated)
                | (Running, Failed)
        );
        if !allowed {
            return Err(crate::SandboxError::InvalidState(format!(
                "container {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }

        self.state = next;
        Ok(())
    }

    /// Move to `Failed` unless the handle already reached a terminal state
    pub(crate) fn mark_failed(&mut self) {
        if !self.state.is_terminal() {
            self.state = LifecycleState::Failed;
        }
    }
}
