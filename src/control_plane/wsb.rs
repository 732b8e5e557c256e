//! Production control plane: spawns `wsb.exe`
//!
//! Each call re-checks the host preconditions, spawns the executable without a
//! shell, reads stdout and stderr concurrently while waiting for exit, and
//! folds the three signals into an [`ExecutionResult`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::platform;
use super::{ControlPlane, ExecutionResult};
use crate::error::{Result, SandboxError};

/// Host variables forwarded into the otherwise empty child environment so the
/// control plane runs with the caller's user profile.
const PROFILE_ENV: &[&str] = &[
    "ALLUSERSPROFILE",
    "APPDATA",
    "COMPUTERNAME",
    "ComSpec",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PATHEXT",
    "ProgramData",
    "ProgramFiles",
    "SystemDrive",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERDOMAIN",
    "USERNAME",
    "USERPROFILE",
    "windir",
];

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone)]
enum Executable {
    /// `%LOCALAPPDATA%\Microsoft\WindowsApps\wsb.exe`, behind the full precondition check
    WellKnown,
    #[cfg(test)]
    Fixed(PathBuf),
}

/// Runs the installed `wsb.exe`.
#[derive(Debug, Clone)]
pub struct WsbCli {
    executable: Executable,
}

impl Default for WsbCli {
    fn default() -> Self {
        Self::new()
    }
}

impl WsbCli {
    pub fn new() -> Self {
        Self {
            executable: Executable::WellKnown,
        }
    }

    /// Invoke an arbitrary program through the same capture path.
    #[cfg(test)]
    pub(crate) fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: Executable::Fixed(path.into()),
        }
    }

    /// Check preconditions and resolve the executable path.
    pub fn ensure_available(&self) -> Result<PathBuf> {
        match &self.executable {
            Executable::WellKnown => platform::ensure_available(),
            #[cfg(test)]
            Executable::Fixed(path) => Ok(path.clone()),
        }
    }

    fn command(program: &Path, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command.args(args);

        command.env_clear();
        for key in PROFILE_ENV {
            if let Some(value) = std::env::var_os(key) {
                command.env(key, value);
            }
        }

        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        command
    }
}

#[async_trait]
impl ControlPlane for WsbCli {
    async fn invoke(
        &self,
        args: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let program = self.ensure_available()?;
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }

        debug!(program = %program.display(), ?args, "invoking control plane");
        let start = Instant::now();

        let mut child = Self::command(&program, &args)
            .spawn()
            .map_err(|e| SandboxError::fault(format!("spawn '{}'", program.display()), e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::select! {
            res = async {
                tokio::try_join!(read_stream(stdout), read_stream(stderr), child.wait())
            } => Some(res),
            _ = cancel.cancelled() => None,
        };

        let (stdout, stderr, status) = match outcome {
            Some(res) => res.map_err(|e| SandboxError::fault("read control plane output", e))?,
            None => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill cancelled control-plane process: {}", e);
                }
                return Err(SandboxError::Cancelled);
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        debug!(
            exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            stderr_bytes = stderr.len(),
            "control plane exited"
        );

        ExecutionResult::from_raw(&stdout, &stderr, exit_code)
    }
}

async fn read_stream<R>(reader: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
