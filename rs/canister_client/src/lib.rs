//! A client to interface with canisters via HTTP, authenticating every
//! response it hands out.
mod agent;
mod agent_config;
mod agent_error;
mod builder;
mod envelope;
mod http_client;
pub mod identity;
mod inspect;
mod query_signatures;
mod response_authentication;
mod status;
mod subnet_cache;
mod transport;
mod waiter;

pub use agent::{Agent, PollResult, IC_ROOT_KEY};
pub use agent_config::{ingress_expiry_at, AgentConfig};
pub use agent_error::AgentError;
pub use builder::{AgentBuilder, QueryBuilder, SignedRequest, UpdateBuilder};
pub use envelope::{
    Delegation, Envelope, EnvelopeContent, NodeSignature, QueryResponse, ReadStateResponse,
    RejectCode, RejectResponse, ReplyResponse, SignedDelegation,
    IC_REQUEST_AUTH_DELEGATION_DOMAIN_SEPARATOR, IC_RESPONSE_DOMAIN_SEPARATOR,
};
pub use http_client::{
    parse_replica_url, query_path, read_state_path, update_path, HttpClient, HttpClientConfig,
    ReqwestTransport,
};
pub use identity::Identity;
pub use inspect::{signed_query_inspect, signed_update_inspect};
pub use query_signatures::{ed25519_public_key_from_der, verify_node_signature, verify_query_signatures};
pub use response_authentication::{
    lookup_canister_metadata, lookup_request_status, lookup_subnet, lookup_time,
    signing_subnet_id, RequestStatusResponse, Subnet,
};
pub use status::{ReplicaHealthStatus, Status};
pub use subnet_cache::SubnetCache;
pub use transport::{Transport, TransportError};
pub use waiter::Waiter;

pub use ic_certification::{verify_certificate, Certificate, CertificateValidationError};
pub use ic_request_id::{to_request_id, RequestId};
