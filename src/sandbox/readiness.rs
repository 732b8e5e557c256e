//! Readiness polling
//!
//! A sandbox's login session comes up some time after `StartSandbox` returns.
//! The only reliable signal is a real command execution, so the poller keeps
//! running a harmless probe as the logged-in user until the control plane
//! reports an exit code for it.
//!
//! The loop has no deadline of its own. Callers bound it with the
//! cancellation token.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SandboxClient, SandboxId};
use crate::control_plane::RunAs;
use crate::error::{Result, SandboxError};

/// Side-effect-free command used to test whether the login session can run commands.
pub const PROBE_COMMAND: &str = r"C:\Windows\System32\cmd.exe /c ver";

/// Delay between failed probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Progress of one readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotReady,
    Probing { attempt: u32 },
    Ready,
}

/// Polls a sandbox until its login session accepts commands.
#[derive(Clone)]
pub struct ReadinessPoller {
    client: SandboxClient,
    poll_interval: Duration,
}

impl ReadinessPoller {
    pub fn new(client: SandboxClient) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the probe once. `Ok(true)` when an exit code came back, whatever its value.
    ///
    /// Failures the control plane reports and replies without a usable
    /// `ExitCode` count as "not yet"; any other error is returned.
    pub async fn is_logged_in(&self, id: &SandboxId, cancel: &CancellationToken) -> Result<bool> {
        match self
            .client
            .execute_as(id, PROBE_COMMAND, RunAs::ExistingLogin, None, cancel)
            .await
        {
            Ok(exit_code) => Ok(exit_code.is_some()),
            Err(e) if e.is_retryable_probe_failure() => {
                debug!(sandbox_id = %id, "readiness probe failed: {}", e);
                Ok(false)
            }
            Err(e @ SandboxError::SchemaMismatch { .. }) => {
                warn!(sandbox_id = %id, "readiness probe returned no usable exit code: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Block until the probe succeeds, then wait `settle` more.
    ///
    /// Returns the number of probe attempts. Unbounded unless `cancel` fires.
    pub async fn wait_until_ready(
        &self,
        id: &SandboxId,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        let mut state = ReadinessState::NotReady;
        let mut attempt = 0u32;

        while state != ReadinessState::Ready {
            attempt += 1;
            state = ReadinessState::Probing { attempt };
            if self.is_logged_in(id, cancel).await? {
                state = ReadinessState::Ready;
            } else {
                debug!(sandbox_id = %id, ?state, "sandbox not ready yet");
                self.pause(self.poll_interval, cancel).await?;
            }
        }

        info!(sandbox_id = %id, attempt, "sandbox is ready");
        self.pause(settle, cancel).await?;
        Ok(attempt)
    }

    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        if duration.is_zero() {
            return if cancel.is_cancelled() {
                Err(SandboxError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(SandboxError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedControlPlane;
    use std::sync::Arc;
    use std::time::Instant;

    fn poller(cp: &Arc<ScriptedControlPlane>) -> ReadinessPoller {
        ReadinessPoller::new(SandboxClient::new(cp.clone()))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_ready_after_failed_probes() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push("", "The sandbox is not ready", 1);
        cp.push_ok("{}");
        cp.push_ok(r#"{"ExitCode":0}"#);

        let id = SandboxId::from("sb-1");
        let attempts = poller(&cp)
            .wait_until_ready(&id, Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(cp.count_verb("Execute"), 3);
        let probe = &cp.calls()[0];
        assert!(probe.contains(&PROBE_COMMAND.to_string()));
        assert!(probe.contains(&"ExistingLogin".to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_probe_exit_code_still_means_ready() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"ExitCode":1}"#);
        let ready = poller(&cp)
            .is_logged_in(&SandboxId::from("sb-1"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(ready);
    }

    #[tokio::test]
    async fn test_wrong_typed_exit_code_keeps_probing() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"ExitCode":"pending"}"#);
        cp.push_ok(r#"{"ExitCode":0}"#);

        let attempts = poller(&cp)
            .wait_until_ready(&SandboxId::from("sb-1"), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(cp.count_verb("Execute"), 2);
    }

    #[tokio::test]
    async fn test_does_not_finish_before_probe_succeeds() {
        let cp = Arc::new(ScriptedControlPlane::new());
        // Fallback keeps failing forever.
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let err = poller(&cp)
            .wait_until_ready(&SandboxId::from("sb-1"), Duration::ZERO, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Cancelled));
        assert!(cp.count_verb("Execute") >= 2);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_settle_delay() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"ExitCode":0}"#);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = poller(&cp)
            .wait_until_ready(&SandboxId::from("sb-1"), Duration::from_secs(60), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fatal_errors_abort_polling() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_fault("pipe closed");
        let err = poller(&cp)
            .wait_until_ready(&SandboxId::from("sb-1"), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::ExecutionFault { .. }));
        assert_eq!(cp.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_probe_output_aborts_polling() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok("<html>");
        let err = poller(&cp)
            .wait_until_ready(&SandboxId::from("sb-1"), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::MalformedOutput(_)));
    }
}
