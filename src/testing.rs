//! In-memory stand-ins for the control plane and session probe
//!
//! `ScriptedControlPlane` replays queued raw outputs and records every
//! argument vector it receives, so orchestration logic can be checked without
//! spawning `wsb.exe`. Replies queued for a specific verb take precedence over
//! the shared queue, which keeps tests deterministic when the code under test
//! issues calls from background tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ReadinessConfig;
use crate::control_plane::{ControlPlane, ExecutionResult, Verb};
use crate::error::{Result, SandboxError};
use crate::sandbox::SandboxId;
use crate::session::SessionProbe;

#[derive(Debug, Clone)]
enum Reply {
    Raw {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    Fault(String),
}

impl Reply {
    fn into_result(self) -> Result<ExecutionResult> {
        match self {
            Reply::Raw {
                stdout,
                stderr,
                exit_code,
            } => ExecutionResult::from_raw(&stdout, &stderr, exit_code),
            Reply::Fault(message) => Err(SandboxError::fault(
                "spawn scripted control plane",
                std::io::Error::new(std::io::ErrorKind::Other, message),
            )),
        }
    }
}

/// Replays scripted control-plane output.
#[derive(Debug)]
pub struct ScriptedControlPlane {
    replies: Mutex<VecDeque<Reply>>,
    by_verb: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    calls: Mutex<Vec<Vec<String>>>,
}

impl Default for ScriptedControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedControlPlane {
    /// Once the queue is exhausted every call reports `no scripted reply` with exit code 1.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            by_verb: Mutex::new(HashMap::new()),
            fallback: Reply::Raw {
                stdout: String::new(),
                stderr: "no scripted reply".to_string(),
                exit_code: 1,
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one raw invocation outcome.
    pub fn push(&self, stdout: &str, stderr: &str, exit_code: i32) {
        lock(&self.replies).push_back(Reply::Raw {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        });
    }

    /// Queue a clean invocation with the given stdout.
    pub fn push_ok(&self, stdout: &str) {
        self.push(stdout, "", 0);
    }

    /// Queue one raw outcome for calls to `verb` only.
    pub fn push_for(&self, verb: Verb, stdout: &str, stderr: &str, exit_code: i32) {
        lock(&self.by_verb)
            .entry(verb.as_str().to_string())
            .or_default()
            .push_back(Reply::Raw {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code,
            });
    }

    /// Queue a clean outcome for calls to `verb` only.
    pub fn push_ok_for(&self, verb: Verb, stdout: &str) {
        self.push_for(verb, stdout, "", 0);
    }

    /// Queue an I/O fault.
    pub fn push_fault(&self, message: &str) {
        lock(&self.replies).push_back(Reply::Fault(message.to_string()));
    }

    /// Every argument vector received so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls whose first argument is `verb`.
    pub fn count_verb(&self, verb: impl AsRef<str>) -> usize {
        let verb = verb.as_ref();
        lock(&self.calls)
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(verb))
            .count()
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn invoke(
        &self,
        args: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }
        let verb = args.first().cloned().unwrap_or_default();
        lock(&self.calls).push(args);

        let scripted = lock(&self.by_verb)
            .get_mut(&verb)
            .and_then(VecDeque::pop_front);
        let reply = scripted
            .or_else(|| lock(&self.replies).pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        reply.into_result()
    }
}

/// Session probe with a fixed answer.
#[derive(Debug, Default)]
pub struct StaticSessionProbe {
    attached: AtomicBool,
}

impl StaticSessionProbe {
    pub fn new(attached: bool) -> Self {
        Self {
            attached: AtomicBool::new(attached),
        }
    }

    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::SeqCst);
    }
}

impl SessionProbe for StaticSessionProbe {
    fn is_attached(&self, _id: &SandboxId) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

/// Readiness settings that poll every 10 ms with no settle delay.
pub fn quick_readiness(timeout: Duration) -> ReadinessConfig {
    ReadinessConfig {
        timeout,
        settle: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
    }
}
