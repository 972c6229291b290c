use async_trait::async_trait;
use candid::Principal;
use ic_request_id::RequestId;
use std::sync::Arc;
use thiserror::Error;

/// A failure to exchange bytes with a replica.
///
/// The caller may retry the request.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum TransportError {
    #[error("failed to build the HTTP client: {0}")]
    ClientBuildFailed(String),

    #[error("failed to build the URL for {end_point}: {reason}")]
    InvalidUrl { end_point: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("request to {url} timed out")]
    TimedOut { url: String },

    #[error("request to {url} failed with HTTP status {status}: {content}")]
    HttpError {
        url: String,
        status: u16,
        content: String,
    },

    #[error("the response from {url} exceeds the limit of {limit} bytes")]
    ResponseTooLarge { url: String, limit: usize },
}

/// The raw byte-level interface of a replica's public endpoints.
///
/// Envelopes are passed as encoded CBOR and responses are returned as
/// received; the agent takes care of decoding and authenticating them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits an update call. Corresponds to
    /// `/api/v2/canister/<effective_canister_id>/call`.
    async fn call(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
        request_id: RequestId,
    ) -> Result<(), TransportError>;

    /// Corresponds to `/api/v2/canister/<effective_canister_id>/read_state`.
    async fn read_state(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;

    /// Corresponds to `/api/v2/canister/<effective_canister_id>/query`.
    async fn query(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;

    /// Corresponds to `/api/v2/status`.
    async fn status(&self) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn call(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
        request_id: RequestId,
    ) -> Result<(), TransportError> {
        (**self)
            .call(effective_canister_id, envelope, request_id)
            .await
    }

    async fn read_state(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).read_state(effective_canister_id, envelope).await
    }

    async fn query(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).query(effective_canister_id, envelope).await
    }

    async fn status(&self) -> Result<Vec<u8>, TransportError> {
        (**self).status().await
    }
}
