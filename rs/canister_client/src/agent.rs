//! An agent to talk to the Internet Computer through the public endpoints.
use crate::agent_config::AgentConfig;
use crate::agent_error::AgentError;
use crate::builder::{nanos_since_epoch, AgentBuilder, QueryBuilder, UpdateBuilder};
use crate::envelope::{Envelope, EnvelopeContent, QueryResponse, ReadStateResponse};
use crate::identity::Identity;
use crate::query_signatures::{all_signers_known, verify_query_signatures};
use crate::response_authentication::{
    lookup_canister_metadata, lookup_request_status, lookup_subnet, signing_subnet_id,
    RequestStatusResponse, Subnet,
};
use crate::status::Status;
use crate::subnet_cache::SubnetCache;
use crate::transport::Transport;
use crate::waiter::Waiter;
use backoff::backoff::Backoff;
use candid::Principal;
use ic_certification::{verify_certificate, Certificate};
use ic_crypto_tree_hash::Label;
use ic_request_id::RequestId;
use parking_lot::RwLock;
use slog::{debug, info, warn, Logger};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// The DER-encoded root key of the Internet Computer mainnet.
pub const IC_ROOT_KEY: &[u8; 133] = &[
    0x30, 0x81, 0x82, 0x30, 0x1d, 0x06, 0x0d, 0x2b, 0x06, 0x01, 0x04, 0x01,
    0x82, 0xdc, 0x7c, 0x05, 0x03, 0x01, 0x02, 0x01, 0x06, 0x0c, 0x2b, 0x06,
    0x01, 0x04, 0x01, 0x82, 0xdc, 0x7c, 0x05, 0x03, 0x02, 0x01, 0x03, 0x61,
    0x00, 0x81, 0x4c, 0x0e, 0x6e, 0xc7, 0x1f, 0xab, 0x58, 0x3b, 0x08, 0xbd,
    0x81, 0x37, 0x3c, 0x25, 0x5c, 0x3c, 0x37, 0x1b, 0x2e, 0x84, 0x86, 0x3c,
    0x98, 0xa4, 0xf1, 0xe0, 0x8b, 0x74, 0x23, 0x5d, 0x14, 0xfb, 0x5d, 0x9c,
    0x0c, 0xd5, 0x46, 0xd9, 0x68, 0x5f, 0x91, 0x3a, 0x0c, 0x0b, 0x2c, 0xc5,
    0x34, 0x15, 0x83, 0xbf, 0x4b, 0x43, 0x92, 0xe4, 0x67, 0xdb, 0x96, 0xd6,
    0x5b, 0x9b, 0xb4, 0xcb, 0x71, 0x71, 0x12, 0xf8, 0x47, 0x2e, 0x0d, 0x5a,
    0x4d, 0x14, 0x50, 0x5f, 0xfd, 0x74, 0x84, 0xb0, 0x12, 0x91, 0x09, 0x1c,
    0x5f, 0x87, 0xb9, 0x88, 0x83, 0x46, 0x3f, 0x98, 0x09, 0x1a, 0x0b, 0xaa,
    0xae,
];

/// The outcome of a single poll of an update call's status.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PollResult {
    /// The replica does not know the request yet.
    Submitted,
    /// The request was received and is being processed.
    Accepted,
    /// The call replied with these bytes.
    Completed(Vec<u8>),
}

/// An agent to talk to the Internet Computer through the public endpoints.
///
/// Every certificate the agent returns or reads from has been verified
/// against the pinned root key.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn Identity>,
    config: AgentConfig,
    root_key: Arc<RwLock<Vec<u8>>>,
    subnet_cache: Arc<SubnetCache>,
    log: Logger,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("sender", &self.identity.sender())
            .field("config", &self.config)
            .field("root_key", &hex::encode(&*self.root_key.read()))
            .field("cached_subnets", &self.subnet_cache.len())
            .finish()
    }
}

fn now_nanos() -> u64 {
    nanos_since_epoch(SystemTime::now())
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn Identity>,
        config: AgentConfig,
        root_key: Option<Vec<u8>>,
        subnet_cache: Arc<SubnetCache>,
        log: Logger,
    ) -> Self {
        Self {
            transport,
            identity,
            config,
            root_key: Arc::new(RwLock::new(
                root_key.unwrap_or_else(|| IC_ROOT_KEY.to_vec()),
            )),
            subnet_cache,
            log,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn subnet_cache(&self) -> &SubnetCache {
        &self.subnet_cache
    }

    pub fn get_principal(&self) -> Result<Principal, AgentError> {
        self.identity.sender().map_err(AgentError::SigningError)
    }

    /// Requests the status of the replica.
    pub async fn status(&self) -> Result<Status, AgentError> {
        let bytes = self.transport.status().await?;
        Status::from_cbor(&bytes)
    }

    /// Fetches the root key from the replica's status and pins it.
    ///
    /// Only use this against test networks: a malicious replica can hand out
    /// any key.
    pub async fn fetch_root_key(&self) -> Result<(), AgentError> {
        let status = self.status().await?;
        let root_key = match status.root_key.clone() {
            Some(root_key) => root_key,
            None => return Err(AgentError::NoRootKeyInStatus(Box::new(status))),
        };
        info!(self.log, "Pinning root key {} from replica status", hex::encode(&root_key));
        self.set_root_key(root_key);
        Ok(())
    }

    /// Pins the DER-encoded root key. Cached subnets are dropped since they
    /// were verified under the previous key.
    pub fn set_root_key(&self, root_key: Vec<u8>) {
        *self.root_key.write() = root_key;
        self.subnet_cache.clear();
    }

    pub fn read_root_key(&self) -> Vec<u8> {
        self.root_key.read().clone()
    }

    pub(crate) fn ingress_expiry(&self) -> u64 {
        self.config.ingress_expiry_from_now()
    }

    /// Signs `content` with the agent's identity and encodes the envelope.
    pub fn sign_envelope(&self, content: EnvelopeContent) -> Result<Vec<u8>, AgentError> {
        let signature = self
            .identity
            .sign(&content)
            .map_err(AgentError::SigningError)?;
        Envelope {
            content,
            sender_pubkey: signature.public_key,
            sender_sig: signature.signature,
            sender_delegation: signature.delegations,
        }
        .encode()
    }

    pub fn query(&self, canister_id: &Principal, method_name: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, *canister_id, method_name.to_string())
    }

    pub fn update(&self, canister_id: &Principal, method_name: &str) -> UpdateBuilder<'_> {
        UpdateBuilder::new(self, *canister_id, method_name.to_string())
    }

    /// Sends a query call and returns the reply bytes.
    pub async fn query_raw(
        &self,
        canister_id: Principal,
        effective_canister_id: Principal,
        method_name: String,
        arg: Vec<u8>,
        ingress_expiry: Option<u64>,
        nonce: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, AgentError> {
        let content = EnvelopeContent::Query {
            nonce,
            ingress_expiry: ingress_expiry.unwrap_or_else(|| self.ingress_expiry()),
            sender: self.get_principal()?,
            canister_id,
            method_name,
            arg,
        };
        let request_id = content.to_request_id()?;
        let signed_query = self.sign_envelope(content)?;
        self.query_signed(effective_canister_id, signed_query, request_id)
            .await
    }

    /// Sends a pre-signed query with id `request_id` and returns the reply
    /// bytes.
    ///
    /// If configured, the node signatures on the response are verified
    /// against the keys of the subnet hosting `effective_canister_id`.
    pub async fn query_signed(
        &self,
        effective_canister_id: Principal,
        signed_query: Vec<u8>,
        request_id: RequestId,
    ) -> Result<Vec<u8>, AgentError> {
        debug!(
            self.log,
            "Sending query {} to {}", request_id, effective_canister_id
        );
        if !self.config.verify_query_signatures {
            return self
                .query_endpoint(effective_canister_id, signed_query)
                .await?
                .into_result();
        }
        let (response, subnet) = futures::try_join!(
            self.query_endpoint(effective_canister_id, signed_query),
            self.get_subnet_by_canister(&effective_canister_id)
        )?;
        let subnet = if all_signers_known(&response, &subnet) {
            subnet
        } else {
            // The subnet membership may have changed since it was cached.
            self.fetch_subnet_by_canister(&effective_canister_id)
                .await?
        };
        verify_query_signatures(
            &response,
            request_id,
            &subnet,
            now_nanos(),
            self.config.ingress_expiry(),
        )
        .map_err(|err| {
            warn!(
                self.log,
                "Rejecting query response {} from {}: {}", request_id, effective_canister_id, err
            );
            err
        })?;
        response.into_result()
    }

    async fn query_endpoint(
        &self,
        effective_canister_id: Principal,
        signed_query: Vec<u8>,
    ) -> Result<QueryResponse, AgentError> {
        let bytes = self
            .transport
            .query(effective_canister_id, signed_query)
            .await?;
        serde_cbor::from_slice(&bytes).map_err(|e| AgentError::InvalidCborData(e.to_string()))
    }

    /// Submits an update call and returns its request id without waiting
    /// for the outcome.
    pub async fn update_raw(
        &self,
        canister_id: Principal,
        effective_canister_id: Principal,
        method_name: String,
        arg: Vec<u8>,
        ingress_expiry: Option<u64>,
        nonce: Option<Vec<u8>>,
    ) -> Result<RequestId, AgentError> {
        let content = EnvelopeContent::Call {
            nonce,
            ingress_expiry: ingress_expiry.unwrap_or_else(|| self.ingress_expiry()),
            sender: self.get_principal()?,
            canister_id,
            method_name,
            arg,
        };
        let request_id = content.to_request_id()?;
        let signed_update = self.sign_envelope(content)?;
        self.update_signed(effective_canister_id, signed_update, request_id)
            .await?;
        Ok(request_id)
    }

    /// Submits a pre-signed update call with id `request_id`.
    pub async fn update_signed(
        &self,
        effective_canister_id: Principal,
        signed_update: Vec<u8>,
        request_id: RequestId,
    ) -> Result<(), AgentError> {
        debug!(
            self.log,
            "Submitting call {} to {}", request_id, effective_canister_id
        );
        self.transport
            .call(effective_canister_id, signed_update, request_id)
            .await?;
        Ok(())
    }

    /// Reads the status of an update call once.
    ///
    /// If the certificate fails verification, the error carries the status
    /// read from the unverified certificate.
    ///
    /// A status whose `reply` or rejection is pruned from the certificate is
    /// read once more before the lookup error is returned.
    pub async fn request_status_raw(
        &self,
        request_id: &RequestId,
        effective_canister_id: Principal,
    ) -> Result<RequestStatusResponse, AgentError> {
        match self
            .request_status_once(request_id, effective_canister_id)
            .await
        {
            Err(AgentError::LookupPathUnknown(path)) => {
                warn!(
                    self.log,
                    "Status of {} is pruned at {}, fetching it again", request_id, path
                );
                self.request_status_once(request_id, effective_canister_id)
                    .await
            }
            result => result,
        }
    }

    async fn request_status_once(
        &self,
        request_id: &RequestId,
        effective_canister_id: Principal,
    ) -> Result<RequestStatusResponse, AgentError> {
        let paths = vec![vec![
            Label::from("request_status"),
            Label::from(&request_id.as_bytes()[..]),
        ]];
        let certificate = self
            .fetch_certificate(paths, effective_canister_id)
            .await?;
        if let Err(err) = self.verify(&certificate, effective_canister_id) {
            warn!(
                self.log,
                "Status certificate for {} failed verification: {}", request_id, err
            );
            return Err(match lookup_request_status(&certificate, request_id) {
                Ok(status) => AgentError::UnverifiedRequestStatus {
                    status: Box::new(status),
                    source: Box::new(err),
                },
                Err(_) => err,
            });
        }
        lookup_request_status(&certificate, request_id)
    }

    /// Polls the status of an update call once.
    pub async fn poll(
        &self,
        request_id: &RequestId,
        effective_canister_id: Principal,
    ) -> Result<PollResult, AgentError> {
        match self
            .request_status_raw(request_id, effective_canister_id)
            .await?
        {
            RequestStatusResponse::Unknown => Ok(PollResult::Submitted),
            RequestStatusResponse::Received | RequestStatusResponse::Processing => {
                Ok(PollResult::Accepted)
            }
            RequestStatusResponse::Replied(reply) => Ok(PollResult::Completed(reply.arg)),
            RequestStatusResponse::Rejected(reject) => Err(AgentError::ReplicaError(reject)),
            RequestStatusResponse::Done => {
                Err(AgentError::RequestStatusDoneNoReply(request_id.to_string()))
            }
        }
    }

    /// Polls the status of an update call until it completes, with the
    /// configured polling policy.
    pub async fn wait(
        &self,
        request_id: &RequestId,
        effective_canister_id: Principal,
    ) -> Result<Vec<u8>, AgentError> {
        self.wait_with(
            request_id,
            effective_canister_id,
            Waiter::from_config(&self.config),
        )
        .await
    }

    /// Polls the status of an update call until it completes, pacing the
    /// polls with `waiter`.
    pub async fn wait_with<B: Backoff>(
        &self,
        request_id: &RequestId,
        effective_canister_id: Principal,
        mut waiter: Waiter<B>,
    ) -> Result<Vec<u8>, AgentError> {
        let mut request_accepted = false;
        loop {
            match self.poll(request_id, effective_canister_id).await? {
                PollResult::Submitted => {}
                PollResult::Accepted => {
                    // Processing may take arbitrarily long once the request
                    // has been accepted; poll eagerly again from here.
                    if !request_accepted {
                        waiter.reset();
                        request_accepted = true;
                    }
                }
                PollResult::Completed(reply) => return Ok(reply),
            }
            if let Err(err) = waiter.wait().await {
                warn!(
                    self.log,
                    "Gave up waiting for {} after {:?}", request_id, waiter.timeout()
                );
                return Err(err);
            }
        }
    }

    async fn fetch_certificate(
        &self,
        paths: Vec<Vec<Label>>,
        effective_canister_id: Principal,
    ) -> Result<Certificate, AgentError> {
        let content = EnvelopeContent::ReadState {
            ingress_expiry: self.ingress_expiry(),
            sender: self.get_principal()?,
            paths,
        };
        let request_id = content.to_request_id()?;
        debug!(
            self.log,
            "Reading state of {} with request {}", effective_canister_id, request_id
        );
        let signed = self.sign_envelope(content)?;
        let bytes = self
            .transport
            .read_state(effective_canister_id, signed)
            .await?;
        let response: ReadStateResponse = serde_cbor::from_slice(&bytes)
            .map_err(|e| AgentError::InvalidCborData(e.to_string()))?;
        Ok(Certificate::from_cbor(&response.certificate)?)
    }

    /// Reads `paths` from the state tree and returns the verified
    /// certificate.
    pub async fn read_state_raw(
        &self,
        paths: Vec<Vec<Label>>,
        effective_canister_id: Principal,
    ) -> Result<Certificate, AgentError> {
        let certificate = self
            .fetch_certificate(paths, effective_canister_id)
            .await?;
        self.verify(&certificate, effective_canister_id)
            .map_err(|err| {
                warn!(
                    self.log,
                    "Certificate for {} failed verification: {}", effective_canister_id, err
                );
                err
            })?;
        Ok(certificate)
    }

    /// Verifies `certificate` against the pinned root key, requiring the
    /// signing subnet to be authorized for `effective_canister_id`.
    pub fn verify(
        &self,
        certificate: &Certificate,
        effective_canister_id: Principal,
    ) -> Result<(), AgentError> {
        verify_certificate(
            certificate,
            &effective_canister_id,
            &self.root_key.read(),
            false,
        )?;
        Ok(())
    }

    // Reads `paths` and applies `lookup` to the certificate. A lookup that
    // hits a pruned subtree is retried once with a fresh certificate.
    async fn read_state_with_refetch<T>(
        &self,
        paths: Vec<Vec<Label>>,
        effective_canister_id: Principal,
        lookup: impl Fn(&Certificate) -> Result<T, AgentError>,
    ) -> Result<T, AgentError> {
        let certificate = self
            .read_state_raw(paths.clone(), effective_canister_id)
            .await?;
        match lookup(&certificate) {
            Err(AgentError::LookupPathUnknown(path)) => {
                warn!(self.log, "Path {} is pruned, fetching the state again", path);
                let certificate = self
                    .read_state_raw(paths, effective_canister_id)
                    .await?;
                lookup(&certificate)
            }
            result => result,
        }
    }

    /// Reads the custom section `name` of the module of `canister_id`.
    pub async fn read_state_canister_metadata(
        &self,
        canister_id: Principal,
        name: &str,
    ) -> Result<Vec<u8>, AgentError> {
        let paths = vec![vec![
            Label::from("canister"),
            Label::from(canister_id.as_slice()),
            Label::from("metadata"),
            Label::from(name),
        ]];
        self.read_state_with_refetch(paths, canister_id, |certificate| {
            lookup_canister_metadata(certificate, &canister_id, name)
        })
        .await
    }

    /// Reads the description of the subnet hosting `canister_id` and
    /// caches it.
    pub async fn fetch_subnet_by_canister(
        &self,
        canister_id: &Principal,
    ) -> Result<Arc<Subnet>, AgentError> {
        // Any certificate for the canister reveals the subnet that signs it.
        let time_certificate = self
            .read_state_raw(vec![vec![Label::from("time")]], *canister_id)
            .await?;
        let subnet_id = signing_subnet_id(&time_certificate, &self.root_key.read());

        let paths = vec![vec![
            Label::from("subnet"),
            Label::from(subnet_id.as_slice()),
        ]];
        let subnet = self
            .read_state_with_refetch(paths, *canister_id, |certificate| {
                lookup_subnet(certificate, &subnet_id)
            })
            .await?;
        info!(
            self.log,
            "Fetched subnet {} with {} nodes for canister {}",
            subnet_id,
            subnet.node_keys.len(),
            canister_id
        );
        let subnet = Arc::new(subnet);
        self.subnet_cache.insert(Arc::clone(&subnet));
        Ok(subnet)
    }

    /// The subnet hosting `canister_id`, from the cache if possible.
    pub async fn get_subnet_by_canister(
        &self,
        canister_id: &Principal,
    ) -> Result<Arc<Subnet>, AgentError> {
        match self.subnet_cache.get_by_canister(canister_id) {
            Some(subnet) => Ok(subnet),
            None => self.fetch_subnet_by_canister(canister_id).await,
        }
    }
}
