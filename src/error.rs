//! Error taxonomy for sandbox orchestration
//!
//! Control-plane failures that the `wsb` CLI reports itself (non-zero exit
//! code or diagnostic text on stderr) are carried as
//! [`SandboxError::ControlPlaneReported`], whose display text is exactly the
//! message derived by [`ExecutionResult::error_message`]. Everything else is
//! raised before a process is spawned or while talking to it.
//!
//! [`ExecutionResult::error_message`]: crate::control_plane::ExecutionResult::error_message

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Host OS family or build cannot run the control plane
    #[error("{reason}")]
    PlatformUnsupported { reason: String },

    /// The control-plane executable is not installed
    #[error(
        "Windows Sandbox CLI was not found at {}. Please install the latest Windows Sandbox app from Microsoft Store.",
        path.display()
    )]
    ControlPlaneMissing { path: PathBuf },

    /// Caller supplied a value the control plane does not accept
    #[error("Invalid value for {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// Spawning or talking to the control-plane process failed
    #[error("Failed to {context}: {source}")]
    ExecutionFault {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Control plane wrote something other than a JSON document to stdout
    #[error("Control plane returned malformed output: {0}")]
    MalformedOutput(#[source] serde_json::Error),

    /// A payload field was present but did not have the expected type
    #[error("Unexpected {verb} payload: {source}")]
    SchemaMismatch {
        verb: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Non-zero exit code or stderr text from the control plane
    #[error("{0}")]
    ControlPlaneReported(String),

    /// A sandbox is already running, so a new one must not be started
    #[error("A sandbox is already running ({0}).")]
    AlreadyRunning(String),

    /// Exactly one running sandbox was required but a different number was observed
    #[error("No single running sandbox ({running} running).")]
    NoSingleSandbox { running: usize },

    /// The operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl SandboxError {
    pub(crate) fn fault(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::ExecutionFault {
            context: context.into(),
            source,
        }
    }

    /// Whether a readiness probe that failed with this error should simply be retried.
    ///
    /// Only failures reported by the control plane itself qualify; precondition
    /// failures, I/O faults, protocol violations and cancellation abort polling.
    pub fn is_retryable_probe_failure(&self) -> bool {
        matches!(self, Self::ControlPlaneReported(_))
    }
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_error_displays_verbatim() {
        let err = SandboxError::ControlPlaneReported("Error: disk full | Exit code: 1".into());
        assert_eq!(err.to_string(), "Error: disk full | Exit code: 1");
    }

    #[test]
    fn test_only_reported_errors_are_retryable() {
        assert!(SandboxError::ControlPlaneReported("Exit code: 1".into()).is_retryable_probe_failure());
        assert!(!SandboxError::Cancelled.is_retryable_probe_failure());
        assert!(!SandboxError::ControlPlaneMissing {
            path: PathBuf::from("wsb.exe")
        }
        .is_retryable_probe_failure());
        assert!(!SandboxError::fault(
            "spawn wsb.exe",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone")
        )
        .is_retryable_probe_failure());
    }

    #[test]
    fn test_missing_control_plane_message_is_actionable() {
        let err = SandboxError::ControlPlaneMissing {
            path: PathBuf::from(r"C:\Users\me\AppData\Local\Microsoft\WindowsApps\wsb.exe"),
        };
        assert!(err.to_string().contains("Microsoft Store"));
    }
}
