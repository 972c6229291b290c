use crate::agent_error::AgentError;
use serde::{Deserialize, Serialize};

/// The health of a replica, as reported by its status endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaHealthStatus {
    Starting,
    WaitingForCertifiedState,
    WaitingForRootDelegation,
    CertifiedStateBehind,
    Healthy,
}

/// The response of `/api/v2/status`.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ic_api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_hash: Option<String>,
    /// The DER-encoded root key of the network the replica belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub root_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_health_status: Option<ReplicaHealthStatus>,
}

impl Status {
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, AgentError> {
        serde_cbor::from_slice(bytes).map_err(|e| AgentError::InvalidReplicaStatus(e.to_string()))
    }

    pub fn is_healthy(&self) -> bool {
        self.replica_health_status == Some(ReplicaHealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_cbor::Value;
    use std::collections::BTreeMap;

    fn encode(entries: Vec<(&str, Value)>) -> Vec<u8> {
        let map: BTreeMap<Value, Value> = entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k.to_string()), v))
            .collect();
        let mut bytes = vec![0xd9, 0xd9, 0xf7];
        bytes.extend(serde_cbor::to_vec(&Value::Map(map)).unwrap());
        bytes
    }

    #[test]
    fn should_decode_status_with_root_key() {
        let bytes = encode(vec![
            ("ic_api_version", Value::Text("0.18.0".to_string())),
            ("root_key", Value::Bytes(vec![1, 2, 3])),
            (
                "replica_health_status",
                Value::Text("healthy".to_string()),
            ),
            ("certified_height", Value::Integer(42)),
        ]);

        let status = Status::from_cbor(&bytes).unwrap();

        assert_eq!(status.ic_api_version.as_deref(), Some("0.18.0"));
        assert_eq!(status.root_key, Some(vec![1, 2, 3]));
        assert!(status.is_healthy());
    }

    #[test]
    fn should_decode_status_without_optional_fields() {
        let status = Status::from_cbor(&encode(vec![])).unwrap();

        assert_eq!(status, Status::default());
        assert!(!status.is_healthy());
    }

    #[test]
    fn should_reject_non_map_status() {
        let bytes = serde_cbor::to_vec(&Value::Integer(1)).unwrap();

        assert_matches!(
            Status::from_cbor(&bytes),
            Err(AgentError::InvalidReplicaStatus(_))
        );
    }
}
