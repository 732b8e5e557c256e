//! MCP server for Windows Sandbox.
//!
//! Exposes the sandbox lifecycle as MCP tools over stdio transport using the
//! rmcp SDK. Every tool returns the service's display message as text.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::Config;
use crate::sandbox::{FolderMapping, SandboxConfiguration};
use crate::service::SandboxService;

// ---------------------------------------------------------------------------
// Server instructions
// ---------------------------------------------------------------------------

const INSTRUCTIONS: &str = r"Controls Windows Sandbox through the wsb command line on Windows 11 24H2 (build 26100) or later.

Requirements:
- The host must run Windows 11 24H2 or later with the Windows Sandbox feature enabled.
- At most one sandbox runs at a time.

Tools:
- start_sandbox creates a sandbox. Toggles cover vGPU, networking, audio and video input, protected client, printer and clipboard redirection. Memory (MB), a logon command and host folders to map can also be set. The call returns once the sandbox accepts commands.
- execute_in_sandbox runs a command as ExistingLogin (default) or System, optionally in a working directory.
- add_shared_folder maps another host folder into the running sandbox, read-only unless write access is requested.
- open_sandbox_remote_session opens the viewer window.
- get_sandbox_network reports the sandbox IP addresses.
- is_sandbox_running and stop_sandbox check and end the lifecycle.

Programs available inside a fresh sandbox:
- C:\Windows\System32\winver.exe
- C:\Windows\System32\cmd.exe
- C:\Windows\System32\explorer.exe
- C:\Windows\System32\Taskmgr.exe
- C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe
- C:\Windows\System32\mstsc.exe
- C:\Windows\System32\control.exe
- C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe

Guidelines:
- Check is_sandbox_running before starting a new sandbox.
- Host folder paths must be absolute.
- Use absolute program paths when executing commands.
- Connection and readiness waits are handled by the server.

Typical workflow: is_sandbox_running, start_sandbox, execute_in_sandbox or add_shared_folder as needed, then stop_sandbox.";

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MappedFolderParams {
    /// Absolute path of the host folder
    pub host_path: String,
    /// Absolute path inside the sandbox (defaults to the desktop)
    pub sandbox_path: Option<String>,
    /// Map the folder read-only
    pub read_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct StartSandboxParams {
    /// Whether to enable vGPU
    pub enable_vgpu: Option<bool>,
    /// Whether to enable networking
    pub enable_networking: Option<bool>,
    /// Whether to enable audio input
    pub enable_audio_input: Option<bool>,
    /// Whether to enable video input
    pub enable_video_input: Option<bool>,
    /// Whether to enable protected client
    pub enable_protected_client: Option<bool>,
    /// Whether to enable printer redirection
    pub enable_printer_redirection: Option<bool>,
    /// Whether to enable clipboard redirection
    pub enable_clipboard_redirection: Option<bool>,
    /// Memory size in MB
    pub memory_in_mb: Option<u32>,
    /// Command to execute on logon
    pub logon_command: Option<String>,
    /// Host folders to map into the sandbox
    #[serde(default)]
    pub mapped_folders: Vec<MappedFolderParams>,
}

impl StartSandboxParams {
    pub fn into_configuration(self) -> SandboxConfiguration {
        let folders = self.mapped_folders.into_iter().map(|folder| {
            let mapping = FolderMapping::new(folder.host_path);
            let mapping = match folder.sandbox_path {
                Some(path) => mapping.sandbox_path(path),
                None => mapping,
            };
            match folder.read_only {
                Some(read_only) => mapping.read_only(read_only),
                None => mapping,
            }
        });

        folders
            .fold(SandboxConfiguration::builder(), |builder, folder| {
                builder.map_folder(folder)
            })
            .maybe(self.enable_vgpu, |b, v| b.vgpu(v))
            .maybe(self.enable_networking, |b, v| b.networking(v))
            .maybe(self.enable_audio_input, |b, v| b.audio_input(v))
            .maybe(self.enable_video_input, |b, v| b.video_input(v))
            .maybe(self.enable_protected_client, |b, v| b.protected_client(v))
            .maybe(self.enable_printer_redirection, |b, v| {
                b.printer_redirection(v)
            })
            .maybe(self.enable_clipboard_redirection, |b, v| {
                b.clipboard_redirection(v)
            })
            .maybe(self.memory_in_mb, |b, v| b.memory_in_mb(v))
            .maybe(self.logon_command, |b, v| b.logon_command(v))
            .build()
    }
}

fn default_run_as() -> String {
    "ExistingLogin".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// Command to execute
    pub command: String,
    /// Execution context (ExistingLogin or System)
    #[serde(default = "default_run_as")]
    pub run_as: String,
    /// Working directory inside the sandbox
    pub working_directory: Option<String>,
    /// Wait for the command to exit and report its exit code
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SharedFolderParams {
    /// Host directory path
    pub host_path: String,
    /// Absolute path in the sandbox
    pub sandbox_path: Option<String>,
    /// Whether to allow write access
    pub allow_write: Option<bool>,
}

// ---------------------------------------------------------------------------
// Server struct
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SandboxMcpServer {
    service: Arc<SandboxService>,
    tool_router: ToolRouter<Self>,
}

fn reply(message: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(message)]))
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

#[tool_router]
impl SandboxMcpServer {
    pub fn new(service: SandboxService) -> Self {
        Self {
            service: Arc::new(service),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Starts a new Windows Sandbox. Only one sandbox can run at a time.")]
    async fn start_sandbox(
        &self,
        Parameters(params): Parameters<StartSandboxParams>,
    ) -> Result<CallToolResult, McpError> {
        let config = params.into_configuration();
        reply(self.service.start_sandbox(&config).await)
    }

    #[tool(description = "Executes a command in the running Sandbox.")]
    async fn execute_in_sandbox(
        &self,
        Parameters(params): Parameters<ExecuteParams>,
    ) -> Result<CallToolResult, McpError> {
        reply(
            self.service
                .execute_in_sandbox(
                    &params.command,
                    &params.run_as,
                    params.working_directory.as_deref(),
                    params.wait,
                )
                .await,
        )
    }

    #[tool(description = "Stops the running Sandbox.")]
    async fn stop_sandbox(&self) -> Result<CallToolResult, McpError> {
        reply(self.service.stop_sandbox().await)
    }

    #[tool(description = "Adds a shared folder to the running Sandbox.")]
    async fn add_shared_folder(
        &self,
        Parameters(params): Parameters<SharedFolderParams>,
    ) -> Result<CallToolResult, McpError> {
        reply(
            self.service
                .add_shared_folder(
                    &params.host_path,
                    params.sandbox_path.as_deref(),
                    params.allow_write,
                )
                .await,
        )
    }

    #[tool(
        description = "Opens a window that accesses the currently running Windows Sandbox session."
    )]
    async fn open_sandbox_remote_session(&self) -> Result<CallToolResult, McpError> {
        reply(self.service.open_remote_session().await)
    }

    #[tool(description = "Gets network information for the running Sandbox.")]
    async fn get_sandbox_network(&self) -> Result<CallToolResult, McpError> {
        reply(self.service.get_sandbox_network().await)
    }

    #[tool(description = "Checks if a Sandbox is currently running.")]
    async fn is_sandbox_running(&self) -> Result<CallToolResult, McpError> {
        reply(self.service.is_sandbox_running().await)
    }
}

// ---------------------------------------------------------------------------
// ServerHandler: #[tool_handler] generates list_tools and call_tool
// ---------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for SandboxMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Start the MCP server over stdio transport.
pub async fn start_mcp_server(config: Config) -> anyhow::Result<()> {
    // stdout is the MCP transport channel
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let service = SandboxService::with_defaults(config.readiness);
    let server = SandboxMcpServer::new(service.clone()).serve(stdio()).await?;
    let outcome = server.waiting().await;
    service.shutdown();
    outcome?;
    Ok(())
}
