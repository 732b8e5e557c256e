//! Windows Sandbox lifecycle orchestration
//!
//! Drives Windows Sandbox through the `wsb` control-plane CLI: start, connect,
//! execute, share folders, query networking, list and stop. Layers, bottom up:
//!
//! - [`control_plane`]: host preconditions, argument builders and the
//!   [`ControlPlane`](control_plane::ControlPlane) process seam.
//! - [`sandbox`]: the typed operations facade, readiness polling and the
//!   single-instance rules.
//! - [`service`]: tool-level orchestration producing display messages.
//! - [`mcp_server`]: the MCP stdio server on top of the service.

pub mod config;
pub mod control_plane;
pub mod error;
pub mod mcp_server;
pub mod sandbox;
pub mod service;
pub mod session;
pub mod testing;

pub use config::Config;
pub use control_plane::{ControlPlane, ExecutionResult, RunAs, Verb, WsbCli};
pub use error::{Result, SandboxError};
pub use sandbox::{
    CurrentSandbox, FolderMapping, NetworkInfo, ReadinessPoller, SandboxClient,
    SandboxConfiguration, SandboxId,
};
pub use service::SandboxService;
