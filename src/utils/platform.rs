//! Platform detection utilities

use crate::error::{Result, SandboxError};

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS
    MacOS,
    /// Linux
    Linux,
    /// Windows
    Windows,
    /// Unknown platform
    Unknown,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        const CURRENT: Platform = Platform::Linux;
    } else if #[cfg(target_os = "macos")] {
        const CURRENT: Platform = Platform::MacOS;
    } else if #[cfg(target_os = "windows")] {
        const CURRENT: Platform = Platform::Windows;
    } else {
        const CURRENT: Platform = Platform::Unknown;
    }
}

/// Get the current platform
pub fn get_platform() -> Platform {
    CURRENT
}

impl Platform {
    /// Check if the platform is Linux
    pub fn is_linux(&self) -> bool {
        matches!(self, Platform::Linux)
    }

    /// Get platform name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOS => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        }
    }
}

/// gVisor only runs on Linux hosts
pub fn require_linux() -> Result<()> {
    let platform = get_platform();
    if platform.is_linux() {
        Ok(())
    } else {
        Err(SandboxError::UnsupportedPlatform(format!(
            "sandboxed launches need a Linux host, not {}",
            platform.as_str()
        )))
    }
}
