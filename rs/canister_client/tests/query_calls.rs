mod common;

use assert_matches::assert_matches;
use candid::Principal;
use common::{
    canister_id, foreign_canister_id, node_key_der, subnet_id, FakeReplica, QueryOutcome,
};
use ed25519_dalek::SigningKey;
use ic_canister_client::{AgentConfig, AgentError, RejectCode};
use std::time::Duration;

const EMPTY_REPLY: &[u8] = b"DIDL\x00\x00";

#[tokio::test]
async fn should_accept_query_signed_by_subnet_node() {
    let replica = FakeReplica::new();
    let agent = replica.agent(AgentConfig::default());

    let reply = agent.query(&canister_id(), "greet").call().await;

    assert_eq!(reply, Ok(EMPTY_REPLY.to_vec()));
    let subnet = agent.subnet_cache().get(&subnet_id()).unwrap();
    assert_eq!(subnet.node_keys.len(), replica.subnet_size());
    assert!(subnet.contains_canister(&canister_id()));
    replica.state(|state| assert_eq!(state.read_states.len(), 2));
}

#[tokio::test]
async fn should_reuse_cached_subnet() {
    let replica = FakeReplica::new();
    replica.state(|state| state.query_signers = vec![0, 1, 2]);
    let agent = replica.agent(AgentConfig::default());

    for _ in 0..3 {
        assert_eq!(
            agent.query(&canister_id(), "greet").call().await,
            Ok(EMPTY_REPLY.to_vec())
        );
    }

    replica.state(|state| {
        assert_eq!(state.queries.len(), 3);
        assert_eq!(state.read_states.len(), 2);
    });
}

#[tokio::test]
async fn should_reject_query_without_signatures() {
    let replica = FakeReplica::new();
    replica.state(|state| state.query_signers = vec![]);
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::MissingSignature)
    );
}

#[tokio::test]
async fn should_reject_more_signatures_than_nodes() {
    let replica = FakeReplica::new();
    replica.state(|state| state.query_signers = vec![0, 1, 2, 0]);
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::TooManySignatures { had: 4, needed: 3 })
    );
}

#[tokio::test]
async fn should_reject_corrupted_query_signature() {
    let replica = FakeReplica::new();
    replica.state(|state| state.corrupt_query_signatures = true);
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::QuerySignatureVerificationFailed)
    );
}

#[tokio::test]
async fn should_reject_stale_query_signature() {
    let replica = FakeReplica::new();
    replica.state(|state| state.query_signature_age = Duration::from_secs(360));
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::CertificateOutdated(300))
    );
}

#[tokio::test]
async fn should_refetch_subnet_when_signer_is_unknown() {
    let replica = FakeReplica::new();
    let agent = replica.agent(AgentConfig::default());
    agent.query(&canister_id(), "greet").call().await.unwrap();

    let new_node = SigningKey::from_bytes(&[9; 32]);
    let new_node_id = Principal::self_authenticating(node_key_der(&new_node));
    replica.state(|state| {
        state.unannounced_signer = Some(new_node);
        state.announce_unannounced_signer = true;
    });

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Ok(EMPTY_REPLY.to_vec())
    );
    let subnet = agent.subnet_cache().get(&subnet_id()).unwrap();
    assert!(subnet.node_key(&new_node_id).is_some());
    replica.state(|state| assert_eq!(state.read_states.len(), 4));
}

#[tokio::test]
async fn should_reject_signer_outside_subnet() {
    let replica = FakeReplica::new();
    let intruder = SigningKey::from_bytes(&[9; 32]);
    let intruder_id = Principal::self_authenticating(node_key_der(&intruder));
    replica.state(|state| state.unannounced_signer = Some(intruder));
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::CertificateNotAuthorized {
            canister_id: intruder_id.to_text(),
            subnet_id: subnet_id().to_text(),
        })
    );
}

#[tokio::test]
async fn should_surface_signed_query_rejection() {
    let replica = FakeReplica::new();
    replica.state(|state| {
        state.query_outcome = QueryOutcome::Rejected {
            code: 3,
            message: "no such canister".to_string(),
        }
    });
    let agent = replica.agent(AgentConfig::default());

    assert_matches!(
        agent.query(&canister_id(), "greet").call().await,
        Err(AgentError::ReplicaError(reject))
            if reject.reject_code == RejectCode::DestinationInvalid
                && reject.reject_message == "no such canister"
    );
}

#[tokio::test]
async fn should_skip_signature_verification_when_disabled() {
    let replica = FakeReplica::new();
    replica.state(|state| state.query_signers = vec![]);
    let agent = replica.agent(AgentConfig {
        verify_query_signatures: false,
        ..AgentConfig::default()
    });

    assert_eq!(
        agent.query(&canister_id(), "greet").call().await,
        Ok(EMPTY_REPLY.to_vec())
    );
    replica.state(|state| assert!(state.read_states.is_empty()));
}

#[tokio::test]
async fn should_not_trust_subnet_for_canister_outside_its_ranges() {
    let replica = FakeReplica::new();
    let agent = replica.agent(AgentConfig::default());

    assert_eq!(
        agent.query(&foreign_canister_id(), "greet").call().await,
        Err(AgentError::CertificateNotAuthorized {
            canister_id: foreign_canister_id().to_text(),
            subnet_id: subnet_id().to_text(),
        })
    );
    assert!(agent.subnet_cache().is_empty());
}
