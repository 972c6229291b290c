//! Builders for agents and for the calls they make.
use crate::agent::Agent;
use crate::agent_config::{ingress_expiry_at, AgentConfig};
use crate::agent_error::AgentError;
use crate::envelope::EnvelopeContent;
use crate::http_client::{parse_replica_url, HttpClient, HttpClientConfig, ReqwestTransport};
use crate::identity::{AnonymousIdentity, Identity};
use crate::subnet_cache::SubnetCache;
use crate::transport::Transport;
use crate::waiter::Waiter;
use backoff::backoff::Backoff;
use candid::Principal;
use ic_request_id::RequestId;
use slog::{o, Logger};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Assembles an [`Agent`].
///
/// A transport is required, either given directly or built from a replica
/// URL. Requests are anonymous unless an identity is set.
#[derive(Default)]
pub struct AgentBuilder {
    url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    identity: Option<Arc<dyn Identity>>,
    config: AgentConfig,
    root_key: Option<Vec<u8>>,
    subnet_cache: Option<Arc<SubnetCache>>,
    log: Option<Logger>,
}

impl AgentBuilder {
    /// Talks to the replica at `url` over HTTP.
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_arc_transport(Arc::new(transport))
    }

    pub fn with_arc_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_identity<I: Identity + 'static>(self, identity: I) -> Self {
        self.with_arc_identity(Arc::new(identity))
    }

    pub fn with_arc_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ingress_expiry(mut self, ingress_expiry: Duration) -> Self {
        self.config.ingress_expiry_seconds = ingress_expiry.as_secs();
        self
    }

    pub fn with_verify_query_signatures(mut self, verify_query_signatures: bool) -> Self {
        self.config.verify_query_signatures = verify_query_signatures;
        self
    }

    /// Pins the DER-encoded root key instead of the mainnet key.
    pub fn with_root_key(mut self, root_key: Vec<u8>) -> Self {
        self.root_key = Some(root_key);
        self
    }

    /// Shares a subnet cache between agents.
    pub fn with_subnet_cache(mut self, subnet_cache: Arc<SubnetCache>) -> Self {
        self.subnet_cache = Some(subnet_cache);
        self
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let transport: Arc<dyn Transport> = match (self.transport, self.url) {
            (Some(transport), _) => transport,
            (None, Some(url)) => {
                let http_client = HttpClient::new_with_config(HttpClientConfig {
                    max_response_body_size: self.config.max_response_body_size_bytes,
                    ..HttpClientConfig::default()
                })?;
                Arc::new(ReqwestTransport::create_with_client(
                    parse_replica_url(&url)?,
                    http_client,
                    self.config.http_request_timeout(),
                ))
            }
            (None, None) => return Err(AgentError::MissingReplicaTransport),
        };
        Ok(Agent::new(
            transport,
            self.identity
                .unwrap_or_else(|| Arc::new(AnonymousIdentity)),
            self.config,
            self.root_key,
            self.subnet_cache.unwrap_or_default(),
            self.log
                .unwrap_or_else(|| Logger::root(slog::Discard, o!())),
        ))
    }
}

/// Nanoseconds since the epoch, saturating at `u64::MAX`.
pub(crate) fn nanos_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

fn expiry_after(agent: &Agent, duration: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    ingress_expiry_at(now, duration, agent.config().permitted_drift())
}

/// A request signed but not sent yet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedRequest {
    pub request_id: RequestId,
    pub effective_canister_id: Principal,
    /// The CBOR-encoded envelope.
    pub signed_envelope: Vec<u8>,
}

/// A query call under construction.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'agent> {
    agent: &'agent Agent,
    pub effective_canister_id: Principal,
    pub canister_id: Principal,
    pub method_name: String,
    pub arg: Vec<u8>,
    /// Nanoseconds since the UNIX epoch.
    pub ingress_expiry_datetime: Option<u64>,
    pub nonce: Option<Vec<u8>>,
}

impl<'agent> QueryBuilder<'agent> {
    pub fn new(agent: &'agent Agent, canister_id: Principal, method_name: String) -> Self {
        Self {
            agent,
            effective_canister_id: canister_id,
            canister_id,
            method_name,
            arg: vec![],
            ingress_expiry_datetime: None,
            nonce: None,
        }
    }

    pub fn with_effective_canister_id(mut self, canister_id: Principal) -> Self {
        self.effective_canister_id = canister_id;
        self
    }

    /// Sets the argument blob, usually a Candid-encoded tuple.
    pub fn with_arg<A: Into<Vec<u8>>>(mut self, arg: A) -> Self {
        self.arg = arg.into();
        self
    }

    pub fn with_nonce<N: Into<Vec<u8>>>(mut self, nonce: N) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn expire_at(mut self, time: SystemTime) -> Self {
        self.ingress_expiry_datetime = Some(nanos_since_epoch(time));
        self
    }

    /// Expires the request `duration` from now, minus the permitted drift.
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.ingress_expiry_datetime = Some(expiry_after(self.agent, duration));
        self
    }

    pub async fn call(self) -> Result<Vec<u8>, AgentError> {
        self.agent
            .query_raw(
                self.canister_id,
                self.effective_canister_id,
                self.method_name,
                self.arg,
                self.ingress_expiry_datetime,
                self.nonce,
            )
            .await
    }

    /// Signs the query without sending it.
    pub fn sign(self) -> Result<SignedRequest, AgentError> {
        let content = EnvelopeContent::Query {
            nonce: self.nonce,
            ingress_expiry: self
                .ingress_expiry_datetime
                .unwrap_or_else(|| self.agent.config().ingress_expiry_from_now()),
            sender: self.agent.get_principal()?,
            canister_id: self.canister_id,
            method_name: self.method_name,
            arg: self.arg,
        };
        Ok(SignedRequest {
            request_id: content.to_request_id()?,
            effective_canister_id: self.effective_canister_id,
            signed_envelope: self.agent.sign_envelope(content)?,
        })
    }
}

/// An update call under construction.
#[derive(Debug, Clone)]
pub struct UpdateBuilder<'agent> {
    agent: &'agent Agent,
    pub effective_canister_id: Principal,
    pub canister_id: Principal,
    pub method_name: String,
    pub arg: Vec<u8>,
    /// Nanoseconds since the UNIX epoch.
    pub ingress_expiry_datetime: Option<u64>,
    pub nonce: Option<Vec<u8>>,
}

impl<'agent> UpdateBuilder<'agent> {
    pub fn new(agent: &'agent Agent, canister_id: Principal, method_name: String) -> Self {
        Self {
            agent,
            effective_canister_id: canister_id,
            canister_id,
            method_name,
            arg: vec![],
            ingress_expiry_datetime: None,
            nonce: None,
        }
    }

    pub fn with_effective_canister_id(mut self, canister_id: Principal) -> Self {
        self.effective_canister_id = canister_id;
        self
    }

    pub fn with_arg<A: Into<Vec<u8>>>(mut self, arg: A) -> Self {
        self.arg = arg.into();
        self
    }

    /// Updates with the same content and nonce are deduplicated by the
    /// replica while they have not expired.
    pub fn with_nonce<N: Into<Vec<u8>>>(mut self, nonce: N) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn expire_at(mut self, time: SystemTime) -> Self {
        self.ingress_expiry_datetime = Some(nanos_since_epoch(time));
        self
    }

    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.ingress_expiry_datetime = Some(expiry_after(self.agent, duration));
        self
    }

    /// Submits the call and returns its request id.
    pub async fn call(self) -> Result<RequestId, AgentError> {
        self.agent
            .update_raw(
                self.canister_id,
                self.effective_canister_id,
                self.method_name,
                self.arg,
                self.ingress_expiry_datetime,
                self.nonce,
            )
            .await
    }

    /// Submits the call and polls its status until it completes.
    pub async fn call_and_wait(self) -> Result<Vec<u8>, AgentError> {
        let agent = self.agent;
        let effective_canister_id = self.effective_canister_id;
        let request_id = self.call().await?;
        agent.wait(&request_id, effective_canister_id).await
    }

    /// Like [`UpdateBuilder::call_and_wait`], pacing the polls with `backoff`.
    pub async fn call_and_wait_with<B: Backoff>(self, backoff: B) -> Result<Vec<u8>, AgentError> {
        let agent = self.agent;
        let effective_canister_id = self.effective_canister_id;
        let request_id = self.call().await?;
        let waiter = Waiter::new(backoff, agent.config().ingress_timeout());
        agent
            .wait_with(&request_id, effective_canister_id, waiter)
            .await
    }

    /// Signs the call without sending it.
    pub fn sign(self) -> Result<SignedRequest, AgentError> {
        let content = EnvelopeContent::Call {
            nonce: self.nonce,
            ingress_expiry: self
                .ingress_expiry_datetime
                .unwrap_or_else(|| self.agent.config().ingress_expiry_from_now()),
            sender: self.agent.get_principal()?,
            canister_id: self.canister_id,
            method_name: self.method_name,
            arg: self.arg,
        };
        Ok(SignedRequest {
            request_id: content.to_request_id()?,
            effective_canister_id: self.effective_canister_id,
            signed_envelope: self.agent.sign_envelope(content)?,
        })
    }
}
