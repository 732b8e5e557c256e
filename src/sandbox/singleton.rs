//! Single-instance rules
//!
//! The control plane is the only source of truth for which sandboxes exist,
//! so "the current sandbox" is recomputed from `ListRunningSandboxes` on every
//! call and never cached.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{SandboxClient, SandboxId};
use crate::error::{Result, SandboxError};

/// What the running set says about "the" sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentSandbox {
    None,
    Single(SandboxId),
    /// More than one sandbox is running; none of them is picked.
    Ambiguous(BTreeSet<SandboxId>),
}

impl CurrentSandbox {
    pub fn from_running(mut running: BTreeSet<SandboxId>) -> Self {
        match running.len() {
            0 => Self::None,
            1 => match running.pop_first() {
                Some(id) => Self::Single(id),
                None => Self::None,
            },
            _ => Self::Ambiguous(running),
        }
    }

    /// The single identity, if there is exactly one.
    pub fn id(&self) -> Option<&SandboxId> {
        match self {
            Self::Single(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }

    pub fn running_count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Single(_) => 1,
            Self::Ambiguous(ids) => ids.len(),
        }
    }

    /// Require exactly one running sandbox.
    pub fn require_single(self) -> Result<SandboxId> {
        match self {
            Self::Single(id) => Ok(id),
            other => Err(SandboxError::NoSingleSandbox {
                running: other.running_count(),
            }),
        }
    }
}

impl SandboxClient {
    /// Query the running set and classify it.
    pub async fn current(&self, cancel: &CancellationToken) -> Result<CurrentSandbox> {
        let current = CurrentSandbox::from_running(self.running(cancel).await?);
        if let CurrentSandbox::Ambiguous(ids) = &current {
            warn!(count = ids.len(), "multiple sandboxes are running");
        }
        Ok(current)
    }

    /// Succeeds only when nothing is running, so a new sandbox may be started.
    pub async fn ensure_can_start(&self, cancel: &CancellationToken) -> Result<()> {
        match self.current(cancel).await? {
            CurrentSandbox::None => Ok(()),
            CurrentSandbox::Single(id) => Err(SandboxError::AlreadyRunning(id.to_string())),
            CurrentSandbox::Ambiguous(ids) => {
                Err(SandboxError::NoSingleSandbox { running: ids.len() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedControlPlane;
    use std::sync::Arc;

    fn running_payload(ids: &[&str]) -> String {
        let envs: Vec<_> = ids.iter().map(|id| serde_json::json!({ "Id": id })).collect();
        serde_json::json!({ "WindowsSandboxEnvironments": envs }).to_string()
    }

    #[test]
    fn test_classification() {
        assert_eq!(CurrentSandbox::from_running(BTreeSet::new()), CurrentSandbox::None);

        let one: BTreeSet<_> = [SandboxId::from("a")].into_iter().collect();
        assert_eq!(
            CurrentSandbox::from_running(one).id(),
            Some(&SandboxId::from("a"))
        );

        let two: BTreeSet<_> = ["a", "b"].into_iter().map(SandboxId::from).collect();
        let current = CurrentSandbox::from_running(two);
        assert!(current.is_ambiguous());
        assert!(current.id().is_none());
        assert!(matches!(
            current.require_single(),
            Err(SandboxError::NoSingleSandbox { running: 2 })
        ));
    }

    #[tokio::test]
    async fn test_start_allowed_when_nothing_runs() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(&running_payload(&[]));
        let client = SandboxClient::new(cp.clone());
        assert!(client.ensure_can_start(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_refused_when_one_runs() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(&running_payload(&["sb-1"]));
        let client = SandboxClient::new(cp.clone());
        let err = client
            .ensure_can_start(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::AlreadyRunning(id) if id == "sb-1"));
    }

    #[tokio::test]
    async fn test_start_refused_when_ambiguous() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(&running_payload(&["sb-1", "sb-2", "sb-3"]));
        let client = SandboxClient::new(cp.clone());
        let err = client
            .ensure_can_start(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::NoSingleSandbox { running: 3 }));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push("", "service unavailable", 1);
        let client = SandboxClient::new(cp.clone());
        let err = client.current(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Error: service unavailable | Exit code: 1");
    }
}
