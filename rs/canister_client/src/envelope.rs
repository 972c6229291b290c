//! The messages exchanged with the public endpoints of a replica.
use crate::agent_error::AgentError;
use candid::Principal;
use ic_crypto_tree_hash::Label;
use ic_request_id::{to_request_id, RequestId, RequestIdError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The domain separator prefixed to the request id of a delegation before
/// signing it.
pub const IC_REQUEST_AUTH_DELEGATION_DOMAIN_SEPARATOR: &[u8; 27] =
    b"\x1Aic-request-auth-delegation";

/// The domain separator prefixed to the request id of a query response
/// before a node signs it.
pub const IC_RESPONSE_DOMAIN_SEPARATOR: &[u8; 12] = b"\x0Bic-response";

/// The content of a request, i.e. the part of the envelope whose request id
/// is signed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum EnvelopeContent {
    Call {
        #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
        nonce: Option<Vec<u8>>,
        ingress_expiry: u64,
        sender: Principal,
        canister_id: Principal,
        method_name: String,
        #[serde(with = "serde_bytes")]
        arg: Vec<u8>,
    },
    ReadState {
        ingress_expiry: u64,
        sender: Principal,
        paths: Vec<Vec<Label>>,
    },
    Query {
        #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
        nonce: Option<Vec<u8>>,
        ingress_expiry: u64,
        sender: Principal,
        canister_id: Principal,
        method_name: String,
        #[serde(with = "serde_bytes")]
        arg: Vec<u8>,
    },
}

impl EnvelopeContent {
    pub fn ingress_expiry(&self) -> u64 {
        match self {
            Self::Call { ingress_expiry, .. }
            | Self::ReadState { ingress_expiry, .. }
            | Self::Query { ingress_expiry, .. } => *ingress_expiry,
        }
    }

    pub fn sender(&self) -> &Principal {
        match self {
            Self::Call { sender, .. }
            | Self::ReadState { sender, .. }
            | Self::Query { sender, .. } => sender,
        }
    }

    pub fn request_type(&self) -> &'static str {
        match self {
            Self::Call { .. } => "call",
            Self::ReadState { .. } => "read_state",
            Self::Query { .. } => "query",
        }
    }

    pub fn to_request_id(&self) -> Result<RequestId, RequestIdError> {
        to_request_id(self)
    }
}

/// A request as posted to a replica: the content plus the sender's
/// authentication.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub content: EnvelopeContent,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub sender_pubkey: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub sender_sig: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_delegation: Option<Vec<SignedDelegation>>,
}

impl Envelope {
    /// Encodes the envelope as self-described CBOR.
    pub fn encode(&self) -> Result<Vec<u8>, AgentError> {
        let mut serialized_bytes = Vec::new();
        let mut serializer = serde_cbor::Serializer::new(&mut serialized_bytes);
        serializer
            .self_describe()
            .map_err(|e| AgentError::InvalidCborData(e.to_string()))?;
        self.serialize(&mut serializer)
            .map_err(|e| AgentError::InvalidCborData(e.to_string()))?;
        Ok(serialized_bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AgentError> {
        serde_cbor::from_slice(bytes).map_err(|e| AgentError::InvalidCborData(e.to_string()))
    }
}

/// An authorization of `pubkey` to sign requests on behalf of the signer of
/// the delegation, until `expiration`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Delegation {
    #[serde(with = "serde_bytes")]
    pub pubkey: Vec<u8>,
    /// Nanoseconds since the UNIX epoch.
    pub expiration: u64,
    /// If present, the delegation is only valid for calls to these canisters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Principal>>,
}

impl Delegation {
    /// The bytes that are signed to issue this delegation.
    pub fn signable(&self) -> Result<Vec<u8>, RequestIdError> {
        let request_id = to_request_id(self)?;
        let mut signable = Vec::with_capacity(
            IC_REQUEST_AUTH_DELEGATION_DOMAIN_SEPARATOR.len() + request_id.as_bytes().len(),
        );
        signable.extend_from_slice(IC_REQUEST_AUTH_DELEGATION_DOMAIN_SEPARATOR);
        signable.extend_from_slice(request_id.as_bytes());
        Ok(signable)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// The body of a `read_state` response.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReadStateResponse {
    #[serde(with = "serde_bytes")]
    pub certificate: Vec<u8>,
}

/// The code of a canister or system rejection.
///
/// Codes outside the documented range are kept as `Unknown` with the raw
/// value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum RejectCode {
    SysFatal,
    SysTransient,
    DestinationInvalid,
    CanisterReject,
    CanisterError,
    Unknown(u64),
}

impl From<u64> for RejectCode {
    fn from(code: u64) -> Self {
        match code {
            1 => Self::SysFatal,
            2 => Self::SysTransient,
            3 => Self::DestinationInvalid,
            4 => Self::CanisterReject,
            5 => Self::CanisterError,
            other => Self::Unknown(other),
        }
    }
}

impl From<RejectCode> for u64 {
    fn from(code: RejectCode) -> Self {
        match code {
            RejectCode::SysFatal => 1,
            RejectCode::SysTransient => 2,
            RejectCode::DestinationInvalid => 3,
            RejectCode::CanisterReject => 4,
            RejectCode::CanisterError => 5,
            RejectCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({})", code),
            known => write!(f, "{:?}", known),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    #[serde(with = "serde_bytes")]
    pub arg: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RejectResponse {
    pub reject_code: RejectCode,
    pub reject_message: String,
    pub error_code: Option<String>,
}

impl fmt::Display for RejectResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reject code {}, reject message {}",
            self.reject_code, self.reject_message
        )?;
        if let Some(error_code) = &self.error_code {
            write!(f, ", error code {}", error_code)?;
        }
        Ok(())
    }
}

/// A node's signature on a query response.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NodeSignature {
    /// Nanoseconds since the UNIX epoch at which the node signed.
    pub timestamp: u64,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    /// The node id.
    pub identity: Principal,
}

/// The body of a `query` response.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResponse {
    Replied {
        reply: ReplyResponse,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        signatures: Vec<NodeSignature>,
    },
    Rejected {
        reject_code: RejectCode,
        reject_message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        signatures: Vec<NodeSignature>,
    },
}

// The record a node signs: the response without its signatures, plus the
// request id and the signing time.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum QueryResponseSignable<'a> {
    Replied {
        reply: &'a ReplyResponse,
        request_id: RequestId,
        timestamp: u64,
    },
    Rejected {
        reject_code: RejectCode,
        reject_message: &'a str,
        error_code: Option<&'a str>,
        request_id: RequestId,
        timestamp: u64,
    },
}

impl QueryResponse {
    pub fn signatures(&self) -> &[NodeSignature] {
        match self {
            Self::Replied { signatures, .. } | Self::Rejected { signatures, .. } => signatures,
        }
    }

    /// The bytes a node signs to attest this response to the request with
    /// id `request_id` at time `timestamp`.
    pub fn signable(&self, request_id: RequestId, timestamp: u64) -> Result<Vec<u8>, RequestIdError> {
        let signable = match self {
            Self::Replied { reply, .. } => QueryResponseSignable::Replied {
                reply,
                request_id,
                timestamp,
            },
            Self::Rejected {
                reject_code,
                reject_message,
                error_code,
                ..
            } => QueryResponseSignable::Rejected {
                reject_code: *reject_code,
                reject_message,
                error_code: error_code.as_deref(),
                request_id,
                timestamp,
            },
        };
        let response_id = to_request_id(&signable)?;
        let mut bytes =
            Vec::with_capacity(IC_RESPONSE_DOMAIN_SEPARATOR.len() + response_id.as_bytes().len());
        bytes.extend_from_slice(IC_RESPONSE_DOMAIN_SEPARATOR);
        bytes.extend_from_slice(response_id.as_bytes());
        Ok(bytes)
    }

    /// The reply bytes, or the rejection as a `ReplicaError`.
    pub fn into_result(self) -> Result<Vec<u8>, AgentError> {
        match self {
            Self::Replied { reply, .. } => Ok(reply.arg),
            Self::Rejected {
                reject_code,
                reject_message,
                error_code,
                ..
            } => Err(AgentError::ReplicaError(RejectResponse {
                reject_code,
                reject_message,
                error_code,
            })),
        }
    }
}
