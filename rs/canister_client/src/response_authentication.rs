//! Typed reads from certified state trees.
//!
//! All functions here trust their input: the certificate must have been
//! verified before any of its values are used.
use crate::agent_error::AgentError;
use crate::envelope::{RejectCode, RejectResponse, ReplyResponse};
use candid::Principal;
use ic_certification::{
    lookup_canister_ranges, principal_is_within_ranges, Certificate, PrincipalRange,
};
use ic_crypto_tree_hash::{HashTree, LookupResult, Path};
use ic_request_id::RequestId;
use std::collections::HashMap;

/// The status of an update call, as certified in `request_status/<id>`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RequestStatusResponse {
    /// The certificate does not (yet) know the request.
    Unknown,
    Received,
    Processing,
    Replied(ReplyResponse),
    Rejected(RejectResponse),
    /// The call completed but its reply or rejection has been pruned.
    Done,
}

/// A subnet's keys and the canisters it hosts.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Subnet {
    pub id: Principal,
    /// The DER-encoded BLS public key of the subnet.
    pub public_key: Vec<u8>,
    /// The DER-encoded Ed25519 public keys of the subnet's nodes.
    pub node_keys: HashMap<Principal, Vec<u8>>,
    pub canister_ranges: Vec<PrincipalRange>,
}

impl Subnet {
    pub fn contains_canister(&self, canister_id: &Principal) -> bool {
        principal_is_within_ranges(canister_id, &self.canister_ranges)
    }

    pub fn node_key(&self, node_id: &Principal) -> Option<&[u8]> {
        self.node_keys.get(node_id).map(Vec::as_slice)
    }
}

fn to_path(labels: &[&[u8]]) -> Path {
    labels.iter().copied().collect()
}

fn lookup_value<'a, L: AsRef<[u8]>>(
    tree: &'a HashTree,
    path: &[L],
) -> Result<&'a [u8], AgentError> {
    tree.lookup_value(path).map_err(AgentError::from)
}

fn read_utf8(bytes: &[u8]) -> Result<String, AgentError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| AgentError::Utf8ReadError(e.to_string()))
}

fn read_leb128(mut bytes: &[u8]) -> Result<u64, AgentError> {
    leb128::read::unsigned(&mut bytes).map_err(|e| AgentError::Leb128ReadError(e.to_string()))
}

/// Reads the status of the request `request_id` from a certificate.
///
/// A status path that is absent or pruned yields `Unknown`: the replica
/// that produced the certificate has not seen the request yet.
pub fn lookup_request_status(
    certificate: &Certificate,
    request_id: &RequestId,
) -> Result<RequestStatusResponse, AgentError> {
    let path_status: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"status"];
    let status = match certificate.tree.lookup_path(&path_status) {
        LookupResult::Found(status) => read_utf8(status)?,
        LookupResult::Absent | LookupResult::Unknown => return Ok(RequestStatusResponse::Unknown),
        LookupResult::Error => return Err(AgentError::LookupPathError(to_path(&path_status))),
    };
    match status.as_str() {
        "received" => Ok(RequestStatusResponse::Received),
        "processing" => Ok(RequestStatusResponse::Processing),
        "done" => Ok(RequestStatusResponse::Done),
        "replied" => lookup_reply(certificate, request_id),
        "rejected" => lookup_rejection(certificate, request_id),
        _ => Err(AgentError::InvalidRequestStatus {
            path: to_path(&path_status),
            status,
        }),
    }
}

fn lookup_reply(
    certificate: &Certificate,
    request_id: &RequestId,
) -> Result<RequestStatusResponse, AgentError> {
    let path: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"reply"];
    let arg = lookup_value(&certificate.tree, &path)?.to_vec();
    Ok(RequestStatusResponse::Replied(ReplyResponse { arg }))
}

fn lookup_rejection(
    certificate: &Certificate,
    request_id: &RequestId,
) -> Result<RequestStatusResponse, AgentError> {
    let code_path: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"reject_code"];
    let message_path: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"reject_message"];
    let error_code_path: [&[u8]; 3] = [b"request_status", request_id.as_bytes(), b"error_code"];

    let reject_code = RejectCode::from(read_leb128(lookup_value(&certificate.tree, &code_path)?)?);
    let reject_message = read_utf8(lookup_value(&certificate.tree, &message_path)?)?;
    let error_code = match certificate.tree.lookup_path(&error_code_path) {
        LookupResult::Found(error_code) => Some(read_utf8(error_code)?),
        _ => None,
    };
    Ok(RequestStatusResponse::Rejected(RejectResponse {
        reject_code,
        reject_message,
        error_code,
    }))
}

/// Reads the certified time, in nanoseconds since the UNIX epoch.
pub fn lookup_time(certificate: &Certificate) -> Result<u64, AgentError> {
    read_leb128(lookup_value(&certificate.tree, &[b"time"])?)
}

/// Reads the custom section `name` of a canister's module.
pub fn lookup_canister_metadata(
    certificate: &Certificate,
    canister_id: &Principal,
    name: &str,
) -> Result<Vec<u8>, AgentError> {
    let path: [&[u8]; 4] = [
        b"canister",
        canister_id.as_slice(),
        b"metadata",
        name.as_bytes(),
    ];
    Ok(lookup_value(&certificate.tree, &path)?.to_vec())
}

/// The id of the subnet that signed `certificate`.
pub fn signing_subnet_id(certificate: &Certificate, root_key: &[u8]) -> Principal {
    match &certificate.delegation {
        Some(delegation) => delegation.subnet_id,
        None => Principal::self_authenticating(root_key),
    }
}

/// Reads the description of `subnet_id` from `subnet/<subnet_id>`.
pub fn lookup_subnet(certificate: &Certificate, subnet_id: &Principal) -> Result<Subnet, AgentError> {
    let tree = &certificate.tree;
    let public_key_path: [&[u8]; 3] = [b"subnet", subnet_id.as_slice(), b"public_key"];
    let public_key = lookup_value(tree, &public_key_path)?.to_vec();
    let canister_ranges = lookup_canister_ranges(tree, subnet_id)?;

    let node_path: [&[u8]; 3] = [b"subnet", subnet_id.as_slice(), b"node"];
    let node_tree = tree.lookup_tree(&node_path)?;
    let mut node_keys = HashMap::new();
    for path in node_tree.list_paths() {
        if path.len() != 2 || path[1].as_bytes() != b"public_key" {
            continue;
        }
        let node_id = Principal::try_from_slice(path[0].as_bytes())
            .map_err(|e| AgentError::InvalidCborData(format!("invalid node id: {}", e)))?;
        let node_key = node_tree.lookup_value(&path)?;
        node_keys.insert(node_id, node_key.to_vec());
    }

    Ok(Subnet {
        id: *subnet_id,
        public_key,
        node_keys,
        canister_ranges,
    })
}
