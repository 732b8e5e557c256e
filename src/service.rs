//! Tool-level orchestration
//!
//! `SandboxService` strings facade calls together the way the MCP tools need
//! them (singleton check before start, reconnect-and-wait before execute) and
//! turns every outcome into a message suitable for direct display.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ReadinessConfig;
use crate::control_plane::{ControlPlane, RunAs, WsbCli};
use crate::error::{Result, SandboxError};
use crate::sandbox::{
    CurrentSandbox, ReadinessPoller, SandboxClient, SandboxConfiguration, SandboxId,
};
use crate::session::{self, ProcessTableProbe, SessionProbe};

pub const MSG_ALREADY_RUNNING: &str =
    "A sandbox is already running. Please stop the existing sandbox before starting a new one.";
pub const MSG_START_FAILED: &str = "Failed to start sandbox.";
pub const MSG_STARTED: &str = "Sandbox started successfully.";
pub const MSG_NOT_RUNNING: &str = "No running sandbox found. Please start a sandbox first.";
pub const MSG_NOTHING_TO_STOP: &str = "No running sandbox found.";
pub const MSG_STOPPED: &str = "Sandbox stopped successfully.";

/// Orchestrates the single sandbox on behalf of tool callers.
#[derive(Clone)]
pub struct SandboxService {
    client: SandboxClient,
    poller: ReadinessPoller,
    sessions: Arc<dyn SessionProbe>,
    readiness: ReadinessConfig,
    shutdown: CancellationToken,
}

impl SandboxService {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        sessions: Arc<dyn SessionProbe>,
        readiness: ReadinessConfig,
    ) -> Self {
        let client = SandboxClient::new(control_plane);
        let poller = ReadinessPoller::new(client.clone()).with_poll_interval(readiness.poll_interval);
        Self {
            client,
            poller,
            sessions,
            readiness,
            shutdown: CancellationToken::new(),
        }
    }

    /// Service backed by the installed `wsb.exe` and the host process table.
    pub fn with_defaults(readiness: ReadinessConfig) -> Self {
        Self::new(Arc::new(WsbCli::new()), Arc::new(ProcessTableProbe), readiness)
    }

    /// Cancel every in-flight and future call made through this service.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Wait for readiness, bounded by the configured timeout.
    async fn wait_ready(&self, id: &SandboxId) -> Result<u32> {
        let cancel = self.token();
        let deadline = cancel.clone();
        let timeout = self.readiness.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        });

        let result = self
            .poller
            .wait_until_ready(id, self.readiness.settle, &cancel)
            .await;
        timer.abort();
        result
    }

    fn describe_wait_failure(&self, err: &SandboxError) -> String {
        match err {
            SandboxError::Cancelled if !self.shutdown.is_cancelled() => format!(
                "Sandbox did not become ready within {} seconds.",
                self.readiness.timeout.as_secs()
            ),
            other => format!("Sandbox did not become ready: {}", other),
        }
    }

    /// Open the viewer window without waiting for the call to finish.
    fn connect_in_background(&self, id: &SandboxId) {
        let client = self.client.clone();
        let cancel = self.token();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = client.connect(&id, &cancel).await {
                warn!(sandbox_id = %id, "Failed to connect to sandbox: {}", e);
            }
        });
    }

    /// The one running sandbox, or the message to show instead. `none` is
    /// the reply when nothing is running.
    async fn single_sandbox(
        &self,
        none: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<SandboxId, String> {
        match self.client.current(cancel).await {
            Ok(CurrentSandbox::Single(id)) => Ok(id),
            Ok(CurrentSandbox::None) => Err(none.to_string()),
            Ok(CurrentSandbox::Ambiguous(ids)) => Err(format!(
                "{} sandboxes are running; cannot choose one. Stop the extra sandboxes first.",
                ids.len()
            )),
            Err(e) => Err(format!("Failed to query running sandboxes: {}", e)),
        }
    }

    /// Start a sandbox unless one is already running, then wait until it accepts commands.
    pub async fn start_sandbox(&self, config: &SandboxConfiguration) -> String {
        let cancel = self.token();

        match self.client.ensure_can_start(&cancel).await {
            Ok(()) => {}
            Err(SandboxError::AlreadyRunning(_)) => return MSG_ALREADY_RUNNING.to_string(),
            Err(SandboxError::NoSingleSandbox { running }) => {
                return format!(
                    "{} sandboxes are already running. Stop them before starting a new one.",
                    running
                )
            }
            Err(e) => return format!("{} {}", MSG_START_FAILED, e),
        }

        let id = match self.client.start(Some(config), &cancel).await {
            Ok(Some(id)) => id,
            Ok(None) => return MSG_START_FAILED.to_string(),
            Err(e) => return format!("{} {}", MSG_START_FAILED, e),
        };

        self.connect_in_background(&id);
        match self.wait_ready(&id).await {
            Ok(_) => MSG_STARTED.to_string(),
            Err(e) => self.describe_wait_failure(&e),
        }
    }

    /// Run a command in the current sandbox.
    ///
    /// Reconnects and waits for readiness first when no viewer is attached.
    /// With `wait` unset the command is left running in the background.
    pub async fn execute_in_sandbox(
        &self,
        command: &str,
        run_as: &str,
        working_directory: Option<&str>,
        wait: bool,
    ) -> String {
        let run_as: RunAs = match run_as.parse() {
            Ok(run_as) => run_as,
            Err(e) => return e.to_string(),
        };
        if command.trim().is_empty() {
            return "Command must not be empty.".to_string();
        }

        let cancel = self.token();
        let id = match self.single_sandbox(MSG_NOT_RUNNING, &cancel).await {
            Ok(id) => id,
            Err(message) => return message,
        };

        if !session::is_attached(self.sessions.clone(), &id).await {
            info!(sandbox_id = %id, "no remote session attached, reconnecting");
            self.connect_in_background(&id);
            if let Err(e) = self.wait_ready(&id).await {
                return self.describe_wait_failure(&e);
            }
        }

        if !wait {
            let client = self.client.clone();
            let command = command.to_string();
            let working_directory = working_directory.map(str::to_string);
            tokio::spawn(async move {
                match client
                    .execute_as(&id, &command, run_as, working_directory.as_deref(), &cancel)
                    .await
                {
                    Ok(exit_code) => info!(sandbox_id = %id, ?exit_code, "command finished"),
                    Err(e) => warn!(sandbox_id = %id, "command failed: {}", e),
                }
            });
            return "Command started in sandbox.".to_string();
        }

        match self
            .client
            .execute_as(&id, command, run_as, working_directory, &cancel)
            .await
        {
            Ok(Some(code)) => format!("Command executed in sandbox with exit code {}.", code),
            Ok(None) => "Command executed in sandbox successfully.".to_string(),
            Err(e) => format!("Error executing command in sandbox: {}", e),
        }
    }

    pub async fn stop_sandbox(&self) -> String {
        let cancel = self.token();
        let id = match self.single_sandbox(MSG_NOTHING_TO_STOP, &cancel).await {
            Ok(id) => id,
            Err(message) => return message,
        };

        match self.client.stop(&id, &cancel).await {
            Ok(()) => MSG_STOPPED.to_string(),
            Err(e) => format!("Failed to stop sandbox: {}", e),
        }
    }

    pub async fn add_shared_folder(
        &self,
        host_path: &str,
        sandbox_path: Option<&str>,
        allow_write: Option<bool>,
    ) -> String {
        let cancel = self.token();
        let id = match self.single_sandbox(MSG_NOT_RUNNING, &cancel).await {
            Ok(id) => id,
            Err(message) => return message,
        };

        match self
            .client
            .share_folder(&id, host_path, sandbox_path, allow_write, &cancel)
            .await
        {
            Ok(()) => format!("Shared folder added to sandbox: {}", host_path),
            Err(e) => format!("Failed to add shared folder: {}", e),
        }
    }

    pub async fn open_remote_session(&self) -> String {
        let cancel = self.token();
        let id = match self.single_sandbox(MSG_NOT_RUNNING, &cancel).await {
            Ok(id) => id,
            Err(message) => return message,
        };

        match self.client.connect(&id, &cancel).await {
            Ok(()) => "Sandbox remote session window opened.".to_string(),
            Err(e) => format!("Failed to open remote session: {}", e),
        }
    }

    pub async fn get_sandbox_network(&self) -> String {
        let cancel = self.token();
        let id = match self.single_sandbox(MSG_NOT_RUNNING, &cancel).await {
            Ok(id) => id,
            Err(message) => return message,
        };

        match self.client.network(&id, &cancel).await {
            Ok(networks) if networks.is_empty() => {
                "No network information found for the sandbox.".to_string()
            }
            Ok(networks) => {
                let lines: Vec<String> = networks.iter().map(ToString::to_string).collect();
                format!("Network information:\n{}", lines.join("\n"))
            }
            Err(e) => format!("Failed to get network information: {}", e),
        }
    }

    pub async fn is_sandbox_running(&self) -> String {
        match self.client.current(&self.token()).await {
            Ok(CurrentSandbox::Single(_)) => "A sandbox is currently running.".to_string(),
            Ok(CurrentSandbox::None) => "No sandbox is currently running.".to_string(),
            Ok(CurrentSandbox::Ambiguous(ids)) => {
                format!("{} sandboxes are currently running.", ids.len())
            }
            Err(e) => format!("Failed to query running sandboxes: {}", e),
        }
    }
}
