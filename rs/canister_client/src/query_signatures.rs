//! Verification of the node signatures attached to query responses.
//!
//! A signed query response is one replica's attestation; unlike a
//! certificate it is not backed by the subnet as a whole.
use crate::agent_error::AgentError;
use crate::envelope::{NodeSignature, QueryResponse};
use crate::identity::{ED25519_DER_PREFIX, ED25519_PUBLIC_KEY_DER_SIZE};
use crate::response_authentication::Subnet;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use ic_request_id::RequestId;
use std::time::Duration;

/// Extracts the raw Ed25519 key from a DER-encoded node public key.
pub fn ed25519_public_key_from_der(der: &[u8]) -> Result<VerifyingKey, AgentError> {
    if der.len() != ED25519_PUBLIC_KEY_DER_SIZE {
        return Err(AgentError::DerKeyLengthMismatch {
            expected: ED25519_PUBLIC_KEY_DER_SIZE,
            actual: der.len(),
        });
    }
    let (prefix, key) = der.split_at(ED25519_DER_PREFIX.len());
    if prefix != ED25519_DER_PREFIX {
        return Err(AgentError::DerPrefixMismatch {
            expected: ED25519_DER_PREFIX.to_vec(),
            actual: prefix.to_vec(),
        });
    }
    let key: [u8; 32] = key.try_into().map_err(|_| AgentError::MalformedPublicKey)?;
    VerifyingKey::from_bytes(&key).map_err(|_| AgentError::MalformedPublicKey)
}

/// Verifies a single Ed25519 node signature over `signable`.
pub fn verify_node_signature(
    signable: &[u8],
    signature: &[u8],
    node_key_der: &[u8],
) -> Result<(), AgentError> {
    let key = ed25519_public_key_from_der(node_key_der)?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| AgentError::MalformedSignature(e.to_string()))?;
    key.verify(signable, &signature)
        .map_err(|_| AgentError::QuerySignatureVerificationFailed)
}

fn check_freshness(
    signature: &NodeSignature,
    now_nanos: u64,
    ingress_expiry: Duration,
) -> Result<(), AgentError> {
    let age = now_nanos.saturating_sub(signature.timestamp);
    if u128::from(age) > ingress_expiry.as_nanos() {
        return Err(AgentError::CertificateOutdated(ingress_expiry.as_secs()));
    }
    Ok(())
}

/// Whether every node that signed `response` is known to `subnet`.
pub fn all_signers_known(response: &QueryResponse, subnet: &Subnet) -> bool {
    response
        .signatures()
        .iter()
        .all(|signature| subnet.node_keys.contains_key(&signature.identity))
}

/// Verifies all node signatures on a query response to the request
/// `request_id`.
///
/// The response must carry at least one signature and no more signatures
/// than the subnet has nodes. Each signature must be younger than
/// `ingress_expiry` at `now_nanos` and come from a node of `subnet`.
pub fn verify_query_signatures(
    response: &QueryResponse,
    request_id: RequestId,
    subnet: &Subnet,
    now_nanos: u64,
    ingress_expiry: Duration,
) -> Result<(), AgentError> {
    let signatures = response.signatures();
    if signatures.is_empty() {
        return Err(AgentError::MissingSignature);
    }
    if signatures.len() > subnet.node_keys.len() {
        return Err(AgentError::TooManySignatures {
            had: signatures.len(),
            needed: subnet.node_keys.len(),
        });
    }
    for signature in signatures {
        check_freshness(signature, now_nanos, ingress_expiry)?;
        let node_key = subnet.node_key(&signature.identity).ok_or_else(|| {
            AgentError::CertificateNotAuthorized {
                canister_id: signature.identity.to_text(),
                subnet_id: subnet.id.to_text(),
            }
        })?;
        let signable = response.signable(request_id, signature.timestamp)?;
        verify_node_signature(&signable, &signature.signature, node_key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{RejectCode, ReplyResponse};
    use assert_matches::assert_matches;
    use candid::Principal;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;
    use std::collections::HashMap;

    const NOW: u64 = 1_685_570_400_000_000_000;
    const EXPIRY: Duration = Duration::from_secs(300);

    struct Node {
        id: Principal,
        key: SigningKey,
    }

    impl Node {
        fn new(seed: u64) -> Self {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            Self {
                id: Principal::from_slice(&[seed as u8; 29]),
                key: SigningKey::from_bytes(&rng.gen()),
            }
        }

        fn public_key_der(&self) -> Vec<u8> {
            let mut der = ED25519_DER_PREFIX.to_vec();
            der.extend_from_slice(self.key.verifying_key().as_bytes());
            der
        }

        fn sign(&self, response: &QueryResponse, timestamp: u64) -> NodeSignature {
            let signable = response.signable(request_id(), timestamp).unwrap();
            NodeSignature {
                timestamp,
                signature: self.key.sign(&signable).to_bytes().to_vec(),
                identity: self.id,
            }
        }
    }

    fn request_id() -> RequestId {
        RequestId::new(&[0x42; 32])
    }

    fn subnet(nodes: &[&Node]) -> Subnet {
        Subnet {
            id: Principal::from_slice(&[0x99; 29]),
            public_key: vec![],
            node_keys: nodes
                .iter()
                .map(|node| (node.id, node.public_key_der()))
                .collect::<HashMap<_, _>>(),
            canister_ranges: vec![],
        }
    }

    fn replied() -> QueryResponse {
        QueryResponse::Replied {
            reply: ReplyResponse {
                arg: b"DIDL\x00\x01\x71\x05hello".to_vec(),
            },
            signatures: vec![],
        }
    }

    fn with_signatures(mut response: QueryResponse, new: Vec<NodeSignature>) -> QueryResponse {
        match &mut response {
            QueryResponse::Replied { signatures, .. }
            | QueryResponse::Rejected { signatures, .. } => *signatures = new,
        }
        response
    }

    #[test]
    fn should_verify_signatures_of_all_nodes() {
        let (a, b) = (Node::new(1), Node::new(2));
        let response = replied();
        let signed = with_signatures(
            response.clone(),
            vec![a.sign(&response, NOW - 1_000), b.sign(&response, NOW)],
        );

        assert_eq!(
            verify_query_signatures(&signed, request_id(), &subnet(&[&a, &b]), NOW, EXPIRY),
            Ok(())
        );
    }

    #[test]
    fn should_verify_signature_on_rejection() {
        let node = Node::new(1);
        let response = QueryResponse::Rejected {
            reject_code: RejectCode::DestinationInvalid,
            reject_message: "canister not found".to_string(),
            error_code: Some("IC0301".to_string()),
            signatures: vec![],
        };
        let signed = with_signatures(response.clone(), vec![node.sign(&response, NOW)]);

        assert_eq!(
            verify_query_signatures(&signed, request_id(), &subnet(&[&node]), NOW, EXPIRY),
            Ok(())
        );
    }

    #[test]
    fn should_fail_without_signatures() {
        let node = Node::new(1);
        assert_matches!(
            verify_query_signatures(&replied(), request_id(), &subnet(&[&node]), NOW, EXPIRY),
            Err(AgentError::MissingSignature)
        );
    }

    #[test]
    fn should_fail_with_more_signatures_than_nodes() {
        let node = Node::new(1);
        let response = replied();
        let signed = with_signatures(
            response.clone(),
            vec![node.sign(&response, NOW), node.sign(&response, NOW)],
        );

        assert_matches!(
            verify_query_signatures(&signed, request_id(), &subnet(&[&node]), NOW, EXPIRY),
            Err(AgentError::TooManySignatures { had: 2, needed: 1 })
        );
    }

    #[test]
    fn should_fail_on_outdated_signature() {
        let node = Node::new(1);
        let response = replied();
        let stale = NOW - EXPIRY.as_nanos() as u64 - 1;
        let signed = with_signatures(response.clone(), vec![node.sign(&response, stale)]);

        assert_matches!(
            verify_query_signatures(&signed, request_id(), &subnet(&[&node]), NOW, EXPIRY),
            Err(AgentError::CertificateOutdated(300))
        );
    }

    #[test]
    fn should_fail_for_unknown_node() {
        let (a, b) = (Node::new(1), Node::new(2));
        let response = replied();
        let signed = with_signatures(response.clone(), vec![b.sign(&response, NOW)]);

        assert_matches!(
            verify_query_signatures(&signed, request_id(), &subnet(&[&a]), NOW, EXPIRY),
            Err(AgentError::CertificateNotAuthorized { .. })
        );
        assert!(!all_signers_known(&signed, &subnet(&[&a])));
        assert!(all_signers_known(&signed, &subnet(&[&a, &b])));
    }

    #[test]
    fn should_fail_when_response_differs_from_signed_one() {
        let node = Node::new(1);
        let signature = node.sign(&replied(), NOW);
        let tampered = QueryResponse::Replied {
            reply: ReplyResponse {
                arg: b"DIDL\x00\x01\x71\x05world".to_vec(),
            },
            signatures: vec![signature],
        };

        assert_matches!(
            verify_query_signatures(&tampered, request_id(), &subnet(&[&node]), NOW, EXPIRY),
            Err(AgentError::QuerySignatureVerificationFailed)
        );
    }

    #[test]
    fn should_fail_when_signed_for_other_request() {
        let node = Node::new(1);
        let response = replied();
        let signed = with_signatures(response.clone(), vec![node.sign(&response, NOW)]);

        assert_matches!(
            verify_query_signatures(
                &signed,
                RequestId::new(&[0x43; 32]),
                &subnet(&[&node]),
                NOW,
                EXPIRY
            ),
            Err(AgentError::QuerySignatureVerificationFailed)
        );
    }

    #[test]
    fn should_reject_malformed_node_keys_and_signatures() {
        let node = Node::new(1);
        let der = node.public_key_der();

        assert_matches!(
            verify_node_signature(b"msg", &[0; 64], &der[1..]),
            Err(AgentError::DerKeyLengthMismatch {
                expected: 44,
                actual: 43
            })
        );
        let mut wrong_prefix = der.clone();
        wrong_prefix[0] ^= 1;
        assert_matches!(
            verify_node_signature(b"msg", &[0; 64], &wrong_prefix),
            Err(AgentError::DerPrefixMismatch { .. })
        );
        assert_matches!(
            verify_node_signature(b"msg", &[0; 63], &der),
            Err(AgentError::MalformedSignature(_))
        );
    }
}
