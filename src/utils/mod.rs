//! Utility modules

pub mod debug;
pub mod platform;

pub use debug::DebugLogger;
pub use platform::{get_platform, require_linux, Platform};
