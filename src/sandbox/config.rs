//! Sandbox start configuration and its `.wsb` XML form
//!
//! Only values that were explicitly set are emitted, so an all-default
//! configuration serializes to an empty string and no `--config` flag is sent.

use serde::{Deserialize, Serialize};

/// A host folder exposed inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMapping {
    pub host_path: String,
    pub sandbox_path: Option<String>,
    pub read_only: Option<bool>,
}

impl FolderMapping {
    pub fn new(host_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            sandbox_path: None,
            read_only: None,
        }
    }

    pub fn sandbox_path(mut self, path: impl Into<String>) -> Self {
        self.sandbox_path = Some(path.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<MappedFolder>");
        element(out, "HostFolder", &self.host_path);
        if let Some(path) = &self.sandbox_path {
            element(out, "SandboxFolder", path);
        }
        if let Some(read_only) = self.read_only {
            element(out, "ReadOnly", if read_only { "true" } else { "false" });
        }
        out.push_str("</MappedFolder>");
    }
}

/// Optional toggles for a new sandbox. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxConfiguration {
    vgpu: Option<bool>,
    networking: Option<bool>,
    mapped_folders: Vec<FolderMapping>,
    logon_command: Option<String>,
    audio_input: Option<bool>,
    video_input: Option<bool>,
    protected_client: Option<bool>,
    printer_redirection: Option<bool>,
    clipboard_redirection: Option<bool>,
    memory_in_mb: Option<u32>,
}

impl SandboxConfiguration {
    pub fn builder() -> SandboxConfigurationBuilder {
        SandboxConfigurationBuilder::default()
    }

    pub fn mapped_folders(&self) -> &[FolderMapping] {
        &self.mapped_folders
    }

    pub fn memory_in_mb(&self) -> Option<u32> {
        self.memory_in_mb
    }

    /// True when no option was set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Serialize to a single-line `<Configuration>` document, or `""` when empty.
    pub fn to_xml(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::from("<Configuration>");
        toggle(&mut out, "vGPU", self.vgpu);
        toggle(&mut out, "Networking", self.networking);
        if !self.mapped_folders.is_empty() {
            out.push_str("<MappedFolders>");
            for folder in &self.mapped_folders {
                folder.write_xml(&mut out);
            }
            out.push_str("</MappedFolders>");
        }
        if let Some(command) = &self.logon_command {
            out.push_str("<LogonCommand>");
            element(&mut out, "Command", command);
            out.push_str("</LogonCommand>");
        }
        toggle(&mut out, "AudioInput", self.audio_input);
        toggle(&mut out, "VideoInput", self.video_input);
        toggle(&mut out, "ProtectedClient", self.protected_client);
        toggle(&mut out, "PrinterRedirection", self.printer_redirection);
        toggle(&mut out, "ClipboardRedirection", self.clipboard_redirection);
        if let Some(mb) = self.memory_in_mb {
            element(&mut out, "MemoryInMB", &mb.to_string());
        }
        out.push_str("</Configuration>");
        out
    }
}

/// Builder for [`SandboxConfiguration`].
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigurationBuilder {
    inner: SandboxConfiguration,
}

impl SandboxConfigurationBuilder {
    pub fn vgpu(mut self, enable: bool) -> Self {
        self.inner.vgpu = Some(enable);
        self
    }

    pub fn networking(mut self, enable: bool) -> Self {
        self.inner.networking = Some(enable);
        self
    }

    pub fn audio_input(mut self, enable: bool) -> Self {
        self.inner.audio_input = Some(enable);
        self
    }

    pub fn video_input(mut self, enable: bool) -> Self {
        self.inner.video_input = Some(enable);
        self
    }

    pub fn protected_client(mut self, enable: bool) -> Self {
        self.inner.protected_client = Some(enable);
        self
    }

    pub fn printer_redirection(mut self, enable: bool) -> Self {
        self.inner.printer_redirection = Some(enable);
        self
    }

    pub fn clipboard_redirection(mut self, enable: bool) -> Self {
        self.inner.clipboard_redirection = Some(enable);
        self
    }

    pub fn memory_in_mb(mut self, mb: u32) -> Self {
        self.inner.memory_in_mb = Some(mb);
        self
    }

    pub fn logon_command(mut self, command: impl Into<String>) -> Self {
        self.inner.logon_command = Some(command.into());
        self
    }

    pub fn map_folder(mut self, folder: FolderMapping) -> Self {
        self.inner.mapped_folders.push(folder);
        self
    }

    /// Apply an optional value through one of the setters above.
    pub fn maybe<T>(self, value: Option<T>, set: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(v) => set(self, v),
            None => self,
        }
    }

    pub fn build(self) -> SandboxConfiguration {
        self.inner
    }
}

fn toggle(out: &mut String, name: &str, value: Option<bool>) {
    if let Some(enable) = value {
        element(out, name, if enable { "Enable" } else { "Disable" });
    }
}

fn element(out: &mut String, name: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    escape_into(out, text);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}
