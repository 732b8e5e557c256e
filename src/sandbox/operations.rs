//! One method per control-plane verb
//!
//! Every method builds the verb's argument vector, runs it through the
//! [`ControlPlane`], converts a failed [`ExecutionResult`] into
//! [`SandboxError::ControlPlaneReported`] and only then decodes the payload.
//!
//! The facade does not serialize calls. Issuing `execute` and `stop` for the
//! same sandbox concurrently leaves their ordering to the control plane, so
//! callers must sequence such calls themselves.
//!
//! [`ExecutionResult`]: crate::control_plane::ExecutionResult

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::schema::{
    self, ExecuteOutput, IpAddressOutput, RunningSandboxesOutput, StartSandboxOutput,
};
use super::{NetworkInfo, SandboxConfiguration, SandboxId};
use crate::control_plane::{verbs, ControlPlane, ExecutionResult, RunAs, Verb};
use crate::error::{Result, SandboxError};

/// Typed facade over the `wsb` verbs.
#[derive(Clone)]
pub struct SandboxClient {
    control_plane: Arc<dyn ControlPlane>,
}

impl SandboxClient {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    async fn run(&self, args: Vec<String>, cancel: &CancellationToken) -> Result<ExecutionResult> {
        self.control_plane.invoke(args, cancel).await?.into_checked()
    }

    /// Start a new sandbox. `Ok(None)` when the control plane did not report an id.
    pub async fn start(
        &self,
        config: Option<&SandboxConfiguration>,
        cancel: &CancellationToken,
    ) -> Result<Option<SandboxId>> {
        let result = self.run(verbs::start(config), cancel).await?;
        let output: StartSandboxOutput = schema::decode(Verb::StartSandbox, &result.output)?;
        let id = output.id.map(SandboxId::from);
        match &id {
            Some(id) => info!(sandbox_id = %id, "sandbox started"),
            None => debug!("StartSandbox returned no Id"),
        }
        Ok(id)
    }

    /// Open the remote viewer window for a sandbox.
    pub async fn connect(&self, id: &SandboxId, cancel: &CancellationToken) -> Result<()> {
        self.run(verbs::connect(id), cancel).await?;
        Ok(())
    }

    /// Run `command` inside the sandbox.
    ///
    /// `run_as` must be `ExistingLogin` or `System`; anything else is rejected
    /// before the control plane is invoked. `Ok(None)` means the control plane
    /// accepted the call but reported no exit code.
    pub async fn execute(
        &self,
        id: &SandboxId,
        command: &str,
        run_as: &str,
        working_directory: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>> {
        let run_as: RunAs = run_as.parse()?;
        self.execute_as(id, command, run_as, working_directory, cancel)
            .await
    }

    /// [`execute`](Self::execute) with an already validated identity.
    pub async fn execute_as(
        &self,
        id: &SandboxId,
        command: &str,
        run_as: RunAs,
        working_directory: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>> {
        let args = verbs::execute(id, command, run_as, working_directory);
        let result = self.run(args, cancel).await?;
        let output: ExecuteOutput = schema::decode(Verb::Execute, &result.output)?;
        Ok(output.exit_code)
    }

    pub async fn stop(&self, id: &SandboxId, cancel: &CancellationToken) -> Result<()> {
        self.run(verbs::stop(id), cancel).await?;
        info!(sandbox_id = %id, "sandbox stopped");
        Ok(())
    }

    /// Share a host folder with a running sandbox.
    pub async fn share_folder(
        &self,
        id: &SandboxId,
        host_path: &str,
        sandbox_path: Option<&str>,
        allow_write: Option<bool>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if host_path.trim().is_empty() {
            return Err(SandboxError::InvalidArgument {
                name: "host_path",
                reason: "must not be empty".to_string(),
            });
        }
        let args = verbs::share_folder(id, host_path, sandbox_path, allow_write);
        self.run(args, cancel).await?;
        Ok(())
    }

    /// Network adapters that currently have an IPv4 address.
    pub async fn network(
        &self,
        id: &SandboxId,
        cancel: &CancellationToken,
    ) -> Result<Vec<NetworkInfo>> {
        let result = self.run(verbs::get_ip_address(id), cancel).await?;
        let output: IpAddressOutput = schema::decode(Verb::GetIpAddress, &result.output)?;
        Ok(output
            .networks
            .into_iter()
            .filter(|entry| entry.ipv4_address.is_some())
            .map(|entry| NetworkInfo {
                sandbox_id: id.clone(),
                ipv4_address: entry.ipv4_address,
                ipv6_address: entry.ipv6_address,
            })
            .collect())
    }

    /// Ids of the sandboxes the control plane reports as running right now.
    pub async fn running(&self, cancel: &CancellationToken) -> Result<BTreeSet<SandboxId>> {
        let result = self.run(verbs::list_running(), cancel).await?;
        let output: RunningSandboxesOutput =
            schema::decode(Verb::ListRunningSandboxes, &result.output)?;
        Ok(output
            .environments
            .into_iter()
            .filter_map(|env| env.id.map(SandboxId::from))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedControlPlane;
    use crate::sandbox::FolderMapping;

    fn client(cp: &Arc<ScriptedControlPlane>) -> SandboxClient {
        SandboxClient::new(cp.clone())
    }

    fn id() -> SandboxId {
        SandboxId::from("sb-1")
    }

    #[tokio::test]
    async fn test_start_extracts_id() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"Id":"sb-42"}"#);
        let config = SandboxConfiguration::builder()
            .map_folder(FolderMapping::new(r"C:\Data"))
            .build();

        let started = client(&cp)
            .start(Some(&config), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(started, Some(SandboxId::from("sb-42")));
        let calls = cp.calls();
        assert_eq!(calls[0][..3], ["StartSandbox", "--raw", "--config"]);
    }

    #[tokio::test]
    async fn test_start_without_id_is_not_an_error() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok("");
        let started = client(&cp).start(None, &CancellationToken::new()).await.unwrap();
        assert!(started.is_none());
    }

    #[tokio::test]
    async fn test_reported_error_skips_extraction() {
        let cp = Arc::new(ScriptedControlPlane::new());
        // Payload has an Id, but the failure wins.
        cp.push(r#"{"Id":"sb-42"}"#, "disk full", 1);
        let err = client(&cp).start(None, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Error: disk full | Exit code: 1");
    }

    #[tokio::test]
    async fn test_execute_returns_exit_code() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"ExitCode":3}"#);
        cp.push_ok("{}");

        let c = client(&cp);
        let cancel = CancellationToken::new();
        assert_eq!(
            c.execute(&id(), "cmd /c exit 3", "System", None, &cancel).await.unwrap(),
            Some(3)
        );
        assert_eq!(
            c.execute(&id(), "notepad", "ExistingLogin", Some(r"C:\"), &cancel)
                .await
                .unwrap(),
            None
        );
        assert_eq!(cp.calls()[1].last().map(String::as_str), Some(r"C:\"));
    }

    #[tokio::test]
    async fn test_execute_accepts_unsigned_crash_exit_code() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(r#"{"ExitCode":3221225477}"#);

        let exit = client(&cp)
            .execute(&id(), "crash.exe", "ExistingLogin", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(exit, Some(0xC000_0005));
    }

    #[tokio::test]
    async fn test_invalid_run_as_never_reaches_control_plane() {
        let cp = Arc::new(ScriptedControlPlane::new());
        for bad in ["Administrator", "", "root"] {
            let err = client(&cp)
                .execute(&id(), "whoami", bad, None, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, SandboxError::InvalidArgument { .. }));
        }
        assert_eq!(cp.call_count(), 0);
    }

    #[tokio::test]
    async fn test_network_filters_missing_ipv4() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok(
            r#"{"Networks":[{"IpV4Address":"172.20.0.2"},{"IpV4Address":null,"IpV6Address":"fe80::2"}]}"#,
        );
        let nets = client(&cp).network(&id(), &CancellationToken::new()).await.unwrap();
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].ipv4_address.as_deref(), Some("172.20.0.2"));
        assert_eq!(nets[0].sandbox_id, id());
    }

    #[tokio::test]
    async fn test_network_absent_field_is_empty() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push_ok("{}");
        let nets = client(&cp).network(&id(), &CancellationToken::new()).await.unwrap();
        assert!(nets.is_empty());
    }

    #[tokio::test]
    async fn test_running_is_idempotent() {
        let cp = Arc::new(ScriptedControlPlane::new());
        let payload = r#"{"WindowsSandboxEnvironments":[{"Id":"b"},{"Id":"a"},{"Id":null}]}"#;
        cp.push_ok(payload);
        cp.push_ok(payload);

        let c = client(&cp);
        let cancel = CancellationToken::new();
        let first = c.running(&cancel).await.unwrap();
        let second = c.running(&cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_share_folder_rejects_empty_host_path() {
        let cp = Arc::new(ScriptedControlPlane::new());
        let err = client(&cp)
            .share_folder(&id(), "  ", None, Some(true), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidArgument { name: "host_path", .. }));
        assert_eq!(cp.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_and_connect_surface_failures() {
        let cp = Arc::new(ScriptedControlPlane::new());
        cp.push("", "", 5);
        cp.push("", "no such sandbox", 0);
        let c = client(&cp);
        let cancel = CancellationToken::new();
        assert_eq!(c.stop(&id(), &cancel).await.unwrap_err().to_string(), "Exit code: 5");
        assert_eq!(
            c.connect(&id(), &cancel).await.unwrap_err().to_string(),
            "Error: no such sandbox"
        );
    }
}
