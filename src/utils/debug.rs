//! Logging setup

use tracing_subscriber::{fmt, EnvFilter};

/// Debug logger for launcher operations
pub struct DebugLogger;

impl DebugLogger {
    /// Filter directive for the requested verbosity
    pub fn directive(debug: bool) -> &'static str {
        if debug {
            "sandbox_launcher=debug"
        } else {
            "sandbox_launcher=info"
        }
    }

    /// Initialize the debug logger; `RUST_LOG` overrides the default filter
    pub fn init(debug: bool) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Self::directive(debug)));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(debug)
            .init();
    }
}
