//! Typed views of `wsb --raw` payloads
//!
//! Fields the control plane omits (or sends as `null`) deserialize to `None`
//! or an empty list. A field that is present with the wrong JSON type fails
//! with [`SandboxError::SchemaMismatch`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::control_plane::Verb;
use crate::error::{Result, SandboxError};

/// `StartSandbox` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartSandboxOutput {
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
}

/// `Execute` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteOutput {
    /// Windows exit codes are DWORDs; crashes report values like `0xC0000005`.
    #[serde(rename = "ExitCode", default)]
    pub exit_code: Option<i64>,
}

/// `GetIpAddress` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpAddressOutput {
    #[serde(rename = "Networks", default, deserialize_with = "null_as_empty")]
    pub networks: Vec<NetworkEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkEntry {
    #[serde(rename = "IpV4Address", default)]
    pub ipv4_address: Option<String>,
    #[serde(rename = "IpV6Address", default)]
    pub ipv6_address: Option<String>,
}

/// `ListRunningSandboxes` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunningSandboxesOutput {
    #[serde(
        rename = "WindowsSandboxEnvironments",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub environments: Vec<SandboxEnvironment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxEnvironment {
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode the payload of a clean result for `verb`.
pub fn decode<T: DeserializeOwned>(verb: Verb, output: &Value) -> Result<T> {
    T::deserialize(output).map_err(|source| SandboxError::SchemaMismatch {
        verb: verb.as_str(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_fields_are_none() {
        let start: StartSandboxOutput = decode(Verb::StartSandbox, &json!({})).unwrap();
        assert!(start.id.is_none());

        let exec: ExecuteOutput = decode(Verb::Execute, &json!({"ExitCode": null})).unwrap();
        assert!(exec.exit_code.is_none());

        let net: IpAddressOutput = decode(Verb::GetIpAddress, &json!({})).unwrap();
        assert!(net.networks.is_empty());

        let running: RunningSandboxesOutput =
            decode(Verb::ListRunningSandboxes, &json!({"WindowsSandboxEnvironments": null}))
                .unwrap();
        assert!(running.environments.is_empty());
    }

    #[test]
    fn test_wrong_type_is_schema_mismatch() {
        let err = decode::<StartSandboxOutput>(Verb::StartSandbox, &json!({"Id": 42})).unwrap_err();
        assert!(matches!(
            err,
            SandboxError::SchemaMismatch { verb: "StartSandbox", .. }
        ));

        let err = decode::<ExecuteOutput>(Verb::Execute, &json!({"ExitCode": "zero"})).unwrap_err();
        assert!(matches!(err, SandboxError::SchemaMismatch { .. }));

        let err = decode::<RunningSandboxesOutput>(
            Verb::ListRunningSandboxes,
            &json!({"WindowsSandboxEnvironments": {"Id": "x"}}),
        )
        .unwrap_err();
        assert!(matches!(err, SandboxError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let payload = json!({
            "Networks": [
                {"IpV4Address": "172.20.1.5", "IpV6Address": "fe80::1", "Name": "vEthernet"},
                {"IpV4Address": null}
            ],
            "Extra": true
        });
        let net: IpAddressOutput = decode(Verb::GetIpAddress, &payload).unwrap();
        assert_eq!(net.networks.len(), 2);
        assert_eq!(net.networks[0].ipv4_address.as_deref(), Some("172.20.1.5"));
        assert_eq!(net.networks[0].ipv6_address.as_deref(), Some("fe80::1"));
        assert!(net.networks[1].ipv4_address.is_none());
    }
}
