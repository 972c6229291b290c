use crate::envelope::RejectResponse;
use crate::response_authentication::RequestStatusResponse;
use crate::status::Status;
use crate::transport::TransportError;
use ic_certification::CertificateValidationError;
use ic_crypto_tree_hash::{LookupError, Path};
use ic_request_id::RequestIdError;
use thiserror::Error;

/// Errors returned by the [`Agent`](crate::Agent).
#[derive(Clone, PartialEq, Debug, Error)]
pub enum AgentError {
    #[error("invalid replica URL {url}: {reason}")]
    InvalidReplicaUrl { url: String, reason: String },

    #[error("no transport was configured")]
    MissingReplicaTransport,

    #[error(transparent)]
    TransportError(#[from] TransportError),

    #[error("invalid CBOR data: {0}")]
    InvalidCborData(String),

    #[error("the replica returned an invalid status response: {0}")]
    InvalidReplicaStatus(String),

    #[error("the status response does not contain a root key: {0:?}")]
    NoRootKeyInStatus(Box<Status>),

    #[error("failed to compute a request id: {0}")]
    RequestIdError(#[from] RequestIdError),

    #[error("failed to sign the request: {0}")]
    SigningError(String),

    #[error("certificate verification failed")]
    CertificateVerificationFailed,

    #[error("subnet {subnet_id} is not authorized to respond for canister {canister_id}")]
    CertificateNotAuthorized {
        canister_id: String,
        subnet_id: String,
    },

    #[error("the delegation certificate for subnet {subnet_id} is itself delegated")]
    NestedCertificateDelegation { subnet_id: String },

    #[error("the node signature is older than the ingress expiry of {0} seconds")]
    CertificateOutdated(u64),

    #[error("the public key has {actual} bytes, expected {expected}")]
    DerKeyLengthMismatch { expected: usize, actual: usize },

    #[error(
        "the public key has prefix {}, expected {}",
        hex::encode(actual),
        hex::encode(expected)
    )]
    DerPrefixMismatch { expected: Vec<u8>, actual: Vec<u8> },

    #[error("malformed public key")]
    MalformedPublicKey,

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("the path {0} is absent from the certificate")]
    LookupPathAbsent(Path),

    #[error("the certificate does not contain enough information to look up {0}")]
    LookupPathUnknown(Path),

    #[error("the path {0} does not end at a value")]
    LookupPathError(Path),

    #[error("invalid request status {status:?} at {path}")]
    InvalidRequestStatus { path: Path, status: String },

    #[error("failed to read a LEB128 value: {0}")]
    Leb128ReadError(String),

    #[error("failed to read a UTF-8 string: {0}")]
    Utf8ReadError(String),

    #[error("the query response carries no node signature")]
    MissingSignature,

    #[error("the query response carries {had} signatures but the subnet has only {needed} nodes")]
    TooManySignatures { had: usize, needed: usize },

    #[error("a node signature on the query response does not verify")]
    QuerySignatureVerificationFailed,

    #[error("the replica rejected the request: {0}")]
    ReplicaError(RejectResponse),

    #[error("timed out waiting for the response")]
    TimeoutWaitingForResponse,

    #[error("the call {0} completed but its reply has been pruned")]
    RequestStatusDoneNoReply(String),

    #[error("the status {status:?} of the request could not be verified: {source}")]
    UnverifiedRequestStatus {
        status: Box<RequestStatusResponse>,
        source: Box<AgentError>,
    },

    #[error("{field} mismatch: expected {value_arg}, the envelope contains {value_cbor}")]
    CallDataMismatch {
        field: String,
        value_arg: String,
        value_cbor: String,
    },
}

impl AgentError {
    /// The underlying error if this error wraps an unverified request status.
    pub fn root_cause(&self) -> &AgentError {
        match self {
            AgentError::UnverifiedRequestStatus { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<LookupError> for AgentError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Absent { path } => AgentError::LookupPathAbsent(path),
            LookupError::Unknown { path } => AgentError::LookupPathUnknown(path),
            LookupError::Error { path } => AgentError::LookupPathError(path),
        }
    }
}

impl From<CertificateValidationError> for AgentError {
    fn from(err: CertificateValidationError) -> Self {
        match err {
            CertificateValidationError::VerificationFailed => {
                AgentError::CertificateVerificationFailed
            }
            CertificateValidationError::NotAuthorized {
                canister_id,
                subnet_id,
            } => AgentError::CertificateNotAuthorized {
                canister_id: canister_id.to_text(),
                subnet_id: subnet_id.to_text(),
            },
            CertificateValidationError::NestedDelegation { subnet_id } => {
                AgentError::NestedCertificateDelegation {
                    subnet_id: subnet_id.to_text(),
                }
            }
            CertificateValidationError::DerKeyLengthMismatch { expected, actual } => {
                AgentError::DerKeyLengthMismatch { expected, actual }
            }
            CertificateValidationError::DerPrefixMismatch { expected, actual } => {
                AgentError::DerPrefixMismatch { expected, actual }
            }
            CertificateValidationError::MalformedSignature { reason } => {
                AgentError::MalformedSignature(reason)
            }
            CertificateValidationError::MalformedPublicKey => AgentError::MalformedPublicKey,
            CertificateValidationError::InvalidCborData(reason) => {
                AgentError::InvalidCborData(reason)
            }
            CertificateValidationError::Lookup(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candid::Principal;

    #[test]
    fn should_keep_lookup_path_in_error() {
        let path: Path = ["request_status", "status"].into_iter().collect();
        let err = AgentError::from(LookupError::Unknown { path: path.clone() });

        assert_eq!(err, AgentError::LookupPathUnknown(path));
        assert!(err.to_string().contains("request_status/status"));
    }

    #[test]
    fn should_keep_range_and_signature_failures_apart() {
        let not_authorized = AgentError::from(CertificateValidationError::NotAuthorized {
            canister_id: Principal::anonymous(),
            subnet_id: Principal::management_canister(),
        });
        let failed = AgentError::from(CertificateValidationError::VerificationFailed);

        assert_eq!(
            not_authorized,
            AgentError::CertificateNotAuthorized {
                canister_id: Principal::anonymous().to_text(),
                subnet_id: Principal::management_canister().to_text(),
            }
        );
        assert_eq!(failed, AgentError::CertificateVerificationFailed);
    }

    #[test]
    fn should_name_subnet_of_nested_delegation() {
        let err = AgentError::from(CertificateValidationError::NestedDelegation {
            subnet_id: Principal::management_canister(),
        });

        assert_eq!(
            err,
            AgentError::NestedCertificateDelegation {
                subnet_id: Principal::management_canister().to_text(),
            }
        );
    }

    #[test]
    fn should_unwrap_root_cause_of_unverified_status() {
        let err = AgentError::UnverifiedRequestStatus {
            status: Box::new(RequestStatusResponse::Processing),
            source: Box::new(AgentError::CertificateVerificationFailed),
        };

        assert_eq!(err.root_cause(), &AgentError::CertificateVerificationFailed);
        assert_eq!(
            AgentError::MissingSignature.root_cause(),
            &AgentError::MissingSignature
        );
    }
}
