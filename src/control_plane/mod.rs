//! Control-plane invocation layer
//!
//! Everything that touches the `wsb` executable goes through the
//! [`ControlPlane`] trait: one production implementation ([`WsbCli`]) that
//! spawns the real process, and a scripted one in [`crate::testing`].

pub mod platform;
pub mod result;
pub mod verbs;
pub mod wsb;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use result::ExecutionResult;
pub use verbs::{RunAs, Verb};
pub use wsb::WsbCli;

/// Narrow seam over "run `wsb` with these arguments".
///
/// Implementations return `Ok` for every completed invocation, including ones
/// where the control plane reported a failure; callers inspect
/// [`ExecutionResult::has_error`]. `Err` is reserved for precondition
/// failures, I/O faults, malformed output and cancellation.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Run one invocation with the given argument vector.
    async fn invoke(&self, args: Vec<String>, cancel: &CancellationToken)
        -> Result<ExecutionResult>;
}
