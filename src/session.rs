//! Remote viewer detection
//!
//! A sandbox's viewer window runs as `WindowsSandboxRemoteSession.exe` with
//! the sandbox id on its command line. Any failure to inspect the process
//! table is read as "not attached".

use std::sync::Arc;

use sysinfo::System;
use tracing::debug;

use crate::sandbox::SandboxId;

/// Executable name of the Windows Sandbox viewer.
pub const REMOTE_SESSION_PROCESS: &str = "WindowsSandboxRemoteSession.exe";

/// Answers whether a viewer window is open for a sandbox.
pub trait SessionProbe: Send + Sync {
    fn is_attached(&self, id: &SandboxId) -> bool;
}

/// Probe backed by a `sysinfo` process-table snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTableProbe;

impl SessionProbe for ProcessTableProbe {
    fn is_attached(&self, id: &SandboxId) -> bool {
        let mut sys = System::new();
        sys.refresh_processes();

        let attached = sys
            .processes_by_exact_name(REMOTE_SESSION_PROCESS)
            .any(|process| command_line_mentions(process.cmd(), id));

        debug!(sandbox_id = %id, attached, "checked remote session");
        attached
    }
}

/// True when any argument contains the sandbox id (case-insensitive).
pub fn command_line_mentions(cmd: &[String], id: &SandboxId) -> bool {
    let needle = id.as_str().to_ascii_lowercase();
    !needle.is_empty()
        && cmd
            .iter()
            .any(|arg| arg.to_ascii_lowercase().contains(&needle))
}

/// Run a probe off the async executor; a panicked or failed lookup reads as `false`.
pub async fn is_attached(probe: Arc<dyn SessionProbe>, id: &SandboxId) -> bool {
    let id = id.clone();
    tokio::task::spawn_blocking(move || probe.is_attached(&id))
        .await
        .unwrap_or(false)
}
