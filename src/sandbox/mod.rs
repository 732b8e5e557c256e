//! Sandbox domain: identities, configuration, the operations facade,
//! readiness polling and the single-instance rules.

pub mod config;
pub mod operations;
pub mod readiness;
pub mod schema;
pub mod singleton;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{FolderMapping, SandboxConfiguration, SandboxConfigurationBuilder};
pub use operations::SandboxClient;
pub use readiness::{ReadinessPoller, ReadinessState, PROBE_COMMAND};
pub use singleton::CurrentSandbox;

/// Opaque handle the control plane returns for a running sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(String);

impl SandboxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SandboxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SandboxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for SandboxId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Addresses reported for one sandbox network adapter. Not cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub sandbox_id: SandboxId,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
}

impl fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sandbox ID: {}, IPv4: {}, IPv6: {}",
            self.sandbox_id,
            self.ipv4_address.as_deref().unwrap_or("(Unassigned)"),
            self.ipv6_address.as_deref().unwrap_or("(Unassigned)")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_info_display() {
        let info = NetworkInfo {
            sandbox_id: SandboxId::from("sb-1"),
            ipv4_address: Some("172.20.0.2".into()),
            ipv6_address: None,
        };
        assert_eq!(
            info.to_string(),
            "Sandbox ID: sb-1, IPv4: 172.20.0.2, IPv6: (Unassigned)"
        );
    }

    #[test]
    fn test_sandbox_id_serializes_transparently() {
        let id = SandboxId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
