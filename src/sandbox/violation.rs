//! Runtime violations and the store that records them

use crate::error::runtime_label;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::debug;

/// A running container was found outside the required sandbox runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityViolation {
    /// Container the drift was observed on
    pub container_id: String,
    /// What was detected
    pub reason: String,
    /// When the sample that detected it completed
    pub detected_at: SystemTime,
    /// Runtime reported by inspection
    pub observed_runtime: Option<String>,
    /// Runtime the container must run under
    pub required_runtime: String,
}

impl SecurityViolation {
    /// Violation for a container observed under the wrong runtime
    pub fn runtime_drift(
        container_id: impl Into<String>,
        observed_runtime: Option<String>,
        required_runtime: impl Into<String>,
    ) -> Self {
        let required_runtime = required_runtime.into();
        Self {
            container_id: container_id.into(),
            reason: format!(
                "runtime changed from {} to {}",
                required_runtime,
                runtime_label(&observed_runtime)
            ),
            detected_at: SystemTime::now(),
            observed_runtime,
            required_runtime,
        }
    }
}

impl fmt::Display for SecurityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Security violation on container {}: {}",
            self.container_id, self.reason
        )
    }
}

impl std::error::Error for SecurityViolation {}

type Subscriber = Box<dyn Fn(&SecurityViolation) + Send + Sync>;

/// Violation store for tracking detected runtime drift
#[derive(Clone, Default)]
pub struct ViolationStore {
    violations: Arc<Mutex<Vec<SecurityViolation>>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ViolationStore {
    /// Create a new violation store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation and notify subscribers
    pub fn add_violation(&self, violation: SecurityViolation) {
        debug!("Recording violation: {:?}", violation);

        lock(&self.violations).push(violation.clone());

        for subscriber in lock(&self.subscribers).iter() {
            subscriber(&violation);
        }
    }

    /// Subscribe to violations
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&SecurityViolation) + Send + Sync + 'static,
    {
        lock(&self.subscribers).push(Box::new(callback));
    }

    /// Get all violations
    pub fn get_violations(&self) -> Vec<SecurityViolation> {
        lock(&self.violations).clone()
    }

    /// Get violations recorded for one container
    pub fn get_violations_for(&self, container_id: &str) -> Vec<SecurityViolation> {
        lock(&self.violations)
            .iter()
            .filter(|v| v.container_id == container_id)
            .cloned()
            .collect()
    }

    /// Clear all violations
    pub fn clear(&self) {
        lock(&self.violations).clear();
    }

    /// Get violation count
    pub fn count(&self) -> usize {
        lock(&self.violations).len()
    }
}

impl fmt::Debug for ViolationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViolationStore")
            .field("violations", &self.count())
            .finish_non_exhaustive()
    }
}

// A panicking subscriber must not hide later violations
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
