//! An in-memory replica that answers with certificates signed by the
//! test BLS keys and query responses signed by its own Ed25519 nodes.
#![allow(dead_code)]

use async_trait::async_trait;
use candid::Principal;
use ed25519_dalek::{Signer, SigningKey};
use ic_canister_client::identity::ED25519_DER_PREFIX;
use ic_canister_client::{
    to_request_id, Agent, AgentConfig, Envelope, EnvelopeContent, NodeSignature, QueryResponse,
    ReadStateResponse, RejectCode, ReplyResponse, RequestId, Transport, TransportError,
    IC_RESPONSE_DOMAIN_SEPARATOR,
};
use ic_certification::PrincipalRange;
use ic_certification_test_utils::{
    encode_time, prune_path, to_self_describing_cbor, tree_from_paths, BlsKeyPair,
    CertificateBuilder, ROOT_KEY_SEED,
};
use ic_crypto_tree_hash::Label;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A canister hosted on the fake subnet.
pub fn canister_id() -> Principal {
    canister(1)
}

/// A canister outside the ranges of the fake subnet.
pub fn foreign_canister_id() -> Principal {
    canister(0x0100)
}

pub fn canister(n: u64) -> Principal {
    let mut bytes = n.to_be_bytes().to_vec();
    bytes.extend_from_slice(&[0x01, 0x01]);
    Principal::from_slice(&bytes)
}

pub fn subnet_id() -> Principal {
    Principal::from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x02])
}

pub fn root_key_der() -> Vec<u8> {
    BlsKeyPair::from_seed(ROOT_KEY_SEED).public_key_der()
}

pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

pub fn node_key_der(key: &SigningKey) -> Vec<u8> {
    let mut der = ED25519_DER_PREFIX.to_vec();
    der.extend_from_slice(key.verifying_key().as_bytes());
    der
}

/// What the replica reports for an update call on a single poll.
#[derive(Clone, Debug)]
pub enum CallStatus {
    Received,
    Processing,
    Replied(Vec<u8>),
    Rejected { code: u64, message: String },
    Done,
}

impl CallStatus {
    fn entries(&self) -> Vec<(&'static str, Vec<u8>)> {
        match self {
            CallStatus::Received => vec![("status", b"received".to_vec())],
            CallStatus::Processing => vec![("status", b"processing".to_vec())],
            CallStatus::Replied(reply) => vec![
                ("status", b"replied".to_vec()),
                ("reply", reply.clone()),
            ],
            CallStatus::Rejected { code, message } => vec![
                ("status", b"rejected".to_vec()),
                ("reject_code", leb128_bytes(*code)),
                ("reject_message", message.as_bytes().to_vec()),
            ],
            CallStatus::Done => vec![("status", b"done".to_vec())],
        }
    }
}

fn leb128_bytes(value: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::unsigned(&mut buf, value).unwrap();
    buf
}

#[derive(Clone, Debug)]
pub enum QueryOutcome {
    Replied(Vec<u8>),
    Rejected { code: u64, message: String },
}

/// The knobs a test turns to script the replica.
pub struct ReplicaState {
    /// The statuses reported for the next submitted call, one per poll.
    /// The last one is repeated.
    pub next_call_statuses: Vec<CallStatus>,
    pub metadata: HashMap<(Principal, String), Vec<u8>>,
    /// The number of upcoming certificates whose canister metadata is
    /// pruned.
    pub pruned_metadata_reads: usize,
    /// The number of upcoming certificates whose `reply` leaf is pruned.
    pub pruned_reply_reads: usize,
    /// Sign certificates with a root key the agent does not trust.
    pub rogue_root_key: bool,
    pub query_outcome: QueryOutcome,
    /// Indices of the nodes that sign query responses.
    pub query_signers: Vec<usize>,
    /// A node that signs query responses but is not part of the subnet
    /// until it is announced.
    pub unannounced_signer: Option<SigningKey>,
    pub announce_unannounced_signer: bool,
    pub query_signature_age: Duration,
    pub corrupt_query_signatures: bool,

    pub calls: Vec<Envelope>,
    pub read_states: Vec<Vec<Vec<Label>>>,
    pub queries: Vec<Envelope>,
    statuses: HashMap<RequestId, VecDeque<CallStatus>>,
}

impl Default for ReplicaState {
    fn default() -> Self {
        Self {
            next_call_statuses: vec![],
            metadata: HashMap::new(),
            pruned_metadata_reads: 0,
            pruned_reply_reads: 0,
            rogue_root_key: false,
            query_outcome: QueryOutcome::Replied(b"DIDL\x00\x00".to_vec()),
            query_signers: vec![0],
            unannounced_signer: None,
            announce_unannounced_signer: false,
            query_signature_age: Duration::ZERO,
            corrupt_query_signatures: false,
            calls: vec![],
            read_states: vec![],
            queries: vec![],
            statuses: HashMap::new(),
        }
    }
}

pub struct FakeReplica {
    nodes: Vec<(Principal, SigningKey)>,
    state: Mutex<ReplicaState>,
}

impl FakeReplica {
    pub fn new() -> Arc<Self> {
        let mut rng = ChaChaRng::seed_from_u64(42);
        let nodes = (0..3)
            .map(|_| {
                let key = SigningKey::from_bytes(&rng.gen());
                (Principal::self_authenticating(node_key_der(&key)), key)
            })
            .collect();
        Arc::new(Self {
            nodes,
            state: Mutex::new(ReplicaState::default()),
        })
    }

    pub fn state<R>(&self, f: impl FnOnce(&mut ReplicaState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn node_id(&self, index: usize) -> Principal {
        self.nodes[index].0
    }

    pub fn subnet_size(&self) -> usize {
        self.nodes.len()
    }

    /// An agent that trusts the test root key and talks to this replica.
    pub fn agent(self: &Arc<Self>, config: AgentConfig) -> Agent {
        Agent::builder()
            .with_arc_transport(self.clone())
            .with_config(config)
            .with_root_key(root_key_der())
            .build()
            .unwrap()
    }

    fn subnet_entries(&self, state: &ReplicaState) -> Vec<(Vec<Label>, Vec<u8>)> {
        let subnet_label = || Label::from(subnet_id().as_slice());
        let mut entries = vec![
            (
                vec![Label::from("subnet"), subnet_label(), Label::from("public_key")],
                BlsKeyPair::from_seed(ic_certification_test_utils::SUBNET_KEY_SEED)
                    .public_key_der(),
            ),
            (
                vec![Label::from("subnet"), subnet_label(), Label::from("canister_ranges")],
                serde_cbor::to_vec(&canister_ranges()).unwrap(),
            ),
        ];
        let mut nodes: Vec<(Principal, Vec<u8>)> = self
            .nodes
            .iter()
            .map(|(id, key)| (*id, node_key_der(key)))
            .collect();
        if state.announce_unannounced_signer {
            if let Some(key) = &state.unannounced_signer {
                nodes.push((Principal::self_authenticating(node_key_der(key)), node_key_der(key)));
            }
        }
        for (node_id, key) in nodes {
            entries.push((
                vec![
                    Label::from("subnet"),
                    subnet_label(),
                    Label::from("node"),
                    Label::from(node_id.as_slice()),
                    Label::from("public_key"),
                ],
                key,
            ));
        }
        entries
    }

    fn read_state_response(&self, paths: Vec<Vec<Label>>) -> Vec<u8> {
        let mut state = self.state.lock();
        let mut entries = vec![(vec![Label::from("time")], encode_time(now_nanos()))];
        let mut prune_metadata = false;
        let mut pruned_replies = vec![];
        for path in &paths {
            match path.first().map(|label| label.as_bytes()) {
                Some(b"request_status") => {
                    let request_id = RequestId::new(path[1].as_bytes().try_into().unwrap());
                    let status = state.statuses.get_mut(&request_id).and_then(|script| {
                        if script.len() > 1 {
                            script.pop_front()
                        } else {
                            script.front().cloned()
                        }
                    });
                    if matches!(status, Some(CallStatus::Replied(_))) && state.pruned_reply_reads > 0
                    {
                        state.pruned_reply_reads -= 1;
                        pruned_replies.push(path[1].clone());
                    }
                    for (field, value) in status.iter().flat_map(CallStatus::entries) {
                        entries.push((vec![path[0].clone(), path[1].clone(), Label::from(field)], value));
                    }
                }
                Some(b"canister") => {
                    let canister_id = Principal::from_slice(path[1].as_bytes());
                    let name = String::from_utf8(path[3].as_bytes().to_vec()).unwrap();
                    if let Some(value) = state.metadata.get(&(canister_id, name)) {
                        entries.push((path.clone(), value.clone()));
                    }
                    if state.pruned_metadata_reads > 0 {
                        state.pruned_metadata_reads -= 1;
                        prune_metadata = true;
                    }
                }
                Some(b"subnet") => entries.extend(self.subnet_entries(&state)),
                _ => {}
            }
        }
        state.read_states.push(paths);

        let mut tree = tree_from_paths(entries);
        if prune_metadata {
            tree = prune_path(&tree, &["canister"]);
        }
        for request_id in pruned_replies {
            let reply_path: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"reply"];
            tree = prune_path(&tree, &reply_path);
        }
        let mut builder =
            CertificateBuilder::new(tree).with_delegation(subnet_id(), canister_ranges());
        if state.rogue_root_key {
            builder = builder.with_root_key(BlsKeyPair::from_seed(99));
        }
        serde_cbor::to_vec(&ReadStateResponse {
            certificate: builder.build().cbor,
        })
        .unwrap()
    }

    fn query_response(&self, request_id: RequestId) -> Vec<u8> {
        let state = self.state.lock();
        let timestamp = now_nanos() - state.query_signature_age.as_nanos() as u64;
        let signable = query_signable(&state.query_outcome, request_id, timestamp);
        let mut signers: Vec<(Principal, SigningKey)> = state
            .query_signers
            .iter()
            .map(|index| self.nodes[*index].clone())
            .collect();
        if let Some(key) = &state.unannounced_signer {
            signers.push((Principal::self_authenticating(node_key_der(key)), key.clone()));
        }
        let signatures = signers
            .iter()
            .map(|(node_id, key)| {
                let mut signature = key.sign(&signable).to_bytes().to_vec();
                if state.corrupt_query_signatures {
                    signature[0] ^= 0x01;
                }
                NodeSignature {
                    timestamp,
                    signature,
                    identity: *node_id,
                }
            })
            .collect();
        let response = match &state.query_outcome {
            QueryOutcome::Replied(arg) => QueryResponse::Replied {
                reply: ReplyResponse { arg: arg.clone() },
                signatures,
            },
            QueryOutcome::Rejected { code, message } => QueryResponse::Rejected {
                reject_code: RejectCode::from(*code),
                reject_message: message.clone(),
                error_code: None,
                signatures,
            },
        };
        to_self_describing_cbor(&response)
    }
}

pub fn canister_ranges() -> Vec<PrincipalRange> {
    vec![PrincipalRange::new(canister(0), canister(0xff))]
}

#[derive(Serialize)]
struct Reply<'a> {
    #[serde(with = "serde_bytes")]
    arg: &'a [u8],
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Signable<'a> {
    Replied {
        reply: Reply<'a>,
        #[serde(with = "serde_bytes")]
        request_id: &'a [u8],
        timestamp: u64,
    },
    Rejected {
        reject_code: u64,
        reject_message: &'a str,
        #[serde(with = "serde_bytes")]
        request_id: &'a [u8],
        timestamp: u64,
    },
}

/// The bytes a node signs for a query response, built from the raw record.
pub fn query_signable(outcome: &QueryOutcome, request_id: RequestId, timestamp: u64) -> Vec<u8> {
    let record = match outcome {
        QueryOutcome::Replied(arg) => Signable::Replied {
            reply: Reply { arg },
            request_id: request_id.as_bytes(),
            timestamp,
        },
        QueryOutcome::Rejected { code, message } => Signable::Rejected {
            reject_code: *code,
            reject_message: message,
            request_id: request_id.as_bytes(),
            timestamp,
        },
    };
    let mut signable = IC_RESPONSE_DOMAIN_SEPARATOR.to_vec();
    signable.extend_from_slice(to_request_id(&record).unwrap().as_bytes());
    signable
}

#[async_trait]
impl Transport for FakeReplica {
    async fn call(
        &self,
        _effective_canister_id: Principal,
        envelope: Vec<u8>,
        request_id: RequestId,
    ) -> Result<(), TransportError> {
        let envelope = Envelope::decode(&envelope).unwrap();
        assert_eq!(envelope.content.to_request_id().unwrap(), request_id);
        let mut state = self.state.lock();
        let script = std::mem::take(&mut state.next_call_statuses);
        state.statuses.insert(request_id, script.into());
        state.calls.push(envelope);
        Ok(())
    }

    async fn read_state(
        &self,
        _effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        match Envelope::decode(&envelope).unwrap().content {
            EnvelopeContent::ReadState { paths, .. } => Ok(self.read_state_response(paths)),
            other => panic!("expected a read_state request, got {:?}", other),
        }
    }

    async fn query(
        &self,
        _effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let envelope = Envelope::decode(&envelope).unwrap();
        let request_id = envelope.content.to_request_id().unwrap();
        self.state.lock().queries.push(envelope);
        Ok(self.query_response(request_id))
    }

    async fn status(&self) -> Result<Vec<u8>, TransportError> {
        #[derive(Serialize)]
        struct Status {
            ic_api_version: &'static str,
            #[serde(with = "serde_bytes")]
            root_key: Vec<u8>,
            replica_health_status: &'static str,
        }
        Ok(to_self_describing_cbor(&Status {
            ic_api_version: "0.18.0",
            root_key: root_key_der(),
            replica_health_status: "healthy",
        }))
    }
}

/// A config that polls quickly and gives up after `timeout`.
pub fn fast_polling_config(timeout: Duration) -> AgentConfig {
    AgentConfig {
        ingress_timeout_seconds: timeout.as_secs(),
        min_poll_interval_millis: 200,
        max_poll_interval_millis: 1000,
        ..AgentConfig::default()
    }
}
