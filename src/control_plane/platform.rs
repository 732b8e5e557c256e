//! Host preconditions for running the `wsb` control plane
//!
//! The control plane ships with Windows 11 24H2 (build 26100) and installs
//! per-user under `%LOCALAPPDATA%\Microsoft\WindowsApps`. Both facts are
//! re-read on every call so that updates take effect without a restart.

use std::env;
use std::path::PathBuf;

use sysinfo::System;
use tracing::{debug, warn};

use crate::error::{Result, SandboxError};

/// Setting this to `true` skips the OS build floor (never the OS family check).
pub const IGNORE_OS_VERSION_ENV: &str = "WINSANDMCP_IGNORE_OS_VERSION_CHECKS";

/// First Windows build that ships the `wsb` CLI.
pub const MIN_WINDOWS_BUILD: u32 = 26100;

const EXECUTABLE_NAME: &str = "wsb.exe";

/// Whether the version-floor override is set for this process.
pub fn version_check_overridden() -> bool {
    env::var(IGNORE_OS_VERSION_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Well-known install location of `wsb.exe`, if the local app-data folder resolves.
pub fn executable_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| {
        dir.join("Microsoft")
            .join("WindowsApps")
            .join(EXECUTABLE_NAME)
    })
}

/// Windows build number of the host, as reported by the OS.
pub fn host_build_number() -> Option<u32> {
    System::kernel_version()
        .as_deref()
        .and_then(parse_build_number)
        .or_else(|| System::os_version().as_deref().and_then(parse_build_number))
}

/// Extract the build number from strings like `26100`, `10.0.26100` or `11 (26100)`.
pub fn parse_build_number(raw: &str) -> Option<u32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .last()
        .and_then(|part| part.parse().ok())
}

/// OS family check. Cannot be bypassed.
pub fn ensure_windows() -> Result<()> {
    if cfg!(windows) {
        Ok(())
    } else {
        Err(SandboxError::PlatformUnsupported {
            reason: format!(
                "Windows Sandbox is not supported on {}; a Windows host is required.",
                env::consts::OS
            ),
        })
    }
}

/// OS family and build checks, honouring the build-floor override.
pub fn ensure_supported_os() -> Result<()> {
    ensure_windows()?;

    if version_check_overridden() {
        debug!("{} set, skipping OS build check", IGNORE_OS_VERSION_ENV);
        return Ok(());
    }

    match host_build_number() {
        Some(build) if build >= MIN_WINDOWS_BUILD => Ok(()),
        found => {
            warn!(?found, required = MIN_WINDOWS_BUILD, "Windows build below minimum");
            Err(SandboxError::PlatformUnsupported {
                reason: "This utility requires Windows 11 24H2 or later version.".to_string(),
            })
        }
    }
}

/// Full precondition check; returns the executable to invoke.
pub fn ensure_available() -> Result<PathBuf> {
    ensure_supported_os()?;

    let path = executable_path().ok_or_else(|| SandboxError::PlatformUnsupported {
        reason: "Could not resolve the local application data folder.".to_string(),
    })?;

    if !path.is_file() {
        return Err(SandboxError::ControlPlaneMissing { path });
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_build_number() {
        assert_eq!(parse_build_number("26100"), Some(26100));
        assert_eq!(parse_build_number("10.0.26100"), Some(26100));
        assert_eq!(parse_build_number("11 (26100)"), Some(26100));
        assert_eq!(parse_build_number("10 (19045)"), Some(19045));
        assert_eq!(parse_build_number("unknown"), None);
        assert_eq!(parse_build_number(""), None);
    }

    #[test]
    fn test_executable_path_ends_with_wsb() {
        if let Some(path) = executable_path() {
            assert!(path.ends_with("Microsoft/WindowsApps/wsb.exe") || path.ends_with(r"Microsoft\WindowsApps\wsb.exe"));
        }
    }

    #[test]
    #[serial]
    fn test_override_flag_parsing() {
        env::set_var(IGNORE_OS_VERSION_ENV, "TRUE");
        assert!(version_check_overridden());
        env::set_var(IGNORE_OS_VERSION_ENV, "yes");
        assert!(!version_check_overridden());
        env::remove_var(IGNORE_OS_VERSION_ENV);
        assert!(!version_check_overridden());
    }

    #[cfg(not(windows))]
    #[test]
    #[serial]
    fn test_override_never_bypasses_family_check() {
        env::set_var(IGNORE_OS_VERSION_ENV, "true");
        let err = ensure_available().unwrap_err();
        env::remove_var(IGNORE_OS_VERSION_ENV);
        assert!(matches!(err, SandboxError::PlatformUnsupported { .. }));
    }
}
