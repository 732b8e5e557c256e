//! Argument vectors for each `wsb` verb
//!
//! Every call has the shape `wsb <Verb> --raw [flags]`. Flag names are part of
//! the control plane's wire contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::sandbox::{SandboxConfiguration, SandboxId};

const RAW: &str = "--raw";
const ID: &str = "--id";

/// Control-plane verbs this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    StartSandbox,
    ConnectToSandbox,
    Execute,
    StopSandbox,
    ShareFolder,
    GetIpAddress,
    ListRunningSandboxes,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartSandbox => "StartSandbox",
            Self::ConnectToSandbox => "ConnectToSandbox",
            Self::Execute => "Execute",
            Self::StopSandbox => "StopSandbox",
            Self::ShareFolder => "ShareFolder",
            Self::GetIpAddress => "GetIpAddress",
            Self::ListRunningSandboxes => "ListRunningSandboxes",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a command runs under inside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunAs {
    /// The interactive user session
    ExistingLogin,
    /// The SYSTEM account
    System,
}

impl RunAs {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExistingLogin => "ExistingLogin",
            Self::System => "System",
        }
    }
}

impl fmt::Display for RunAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunAs {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ExistingLogin") {
            Ok(Self::ExistingLogin)
        } else if s.eq_ignore_ascii_case("System") {
            Ok(Self::System)
        } else {
            Err(SandboxError::InvalidArgument {
                name: "run_as",
                reason: format!(
                    "'{}' is not supported, expected ExistingLogin or System",
                    s
                ),
            })
        }
    }
}

fn base(verb: Verb) -> Vec<String> {
    vec![verb.as_str().to_string(), RAW.to_string()]
}

fn with_id(verb: Verb, id: &SandboxId) -> Vec<String> {
    let mut args = base(verb);
    args.push(ID.to_string());
    args.push(id.to_string());
    args
}

/// `StartSandbox --raw [--config <xml>]`; the config flag is omitted when
/// the configuration serializes to nothing.
pub fn start(config: Option<&SandboxConfiguration>) -> Vec<String> {
    let mut args = base(Verb::StartSandbox);
    if let Some(xml) = config.map(SandboxConfiguration::to_xml) {
        if !xml.trim().is_empty() {
            args.push("--config".to_string());
            args.push(xml);
        }
    }
    args
}

pub fn connect(id: &SandboxId) -> Vec<String> {
    with_id(Verb::ConnectToSandbox, id)
}

pub fn execute(
    id: &SandboxId,
    command: &str,
    run_as: RunAs,
    working_directory: Option<&str>,
) -> Vec<String> {
    let mut args = with_id(Verb::Execute, id);
    args.extend([
        "--command".to_string(),
        command.to_string(),
        "--run-as".to_string(),
        run_as.as_str().to_string(),
    ]);
    if let Some(dir) = working_directory {
        args.push("--working-directory".to_string());
        args.push(dir.to_string());
    }
    args
}

pub fn stop(id: &SandboxId) -> Vec<String> {
    with_id(Verb::StopSandbox, id)
}

/// `--allow-write` is only passed when write access was explicitly requested.
pub fn share_folder(
    id: &SandboxId,
    host_path: &str,
    sandbox_path: Option<&str>,
    allow_write: Option<bool>,
) -> Vec<String> {
    let mut args = with_id(Verb::ShareFolder, id);
    args.push("--host-path".to_string());
    args.push(host_path.to_string());
    if let Some(path) = sandbox_path {
        args.push("--sandbox-path".to_string());
        args.push(path.to_string());
    }
    if allow_write == Some(true) {
        args.push("--allow-write".to_string());
    }
    args
}

pub fn get_ip_address(id: &SandboxId) -> Vec<String> {
    with_id(Verb::GetIpAddress, id)
}

pub fn list_running() -> Vec<String> {
    base(Verb::ListRunningSandboxes)
}
