//! The identities on whose behalf requests are signed.
use crate::envelope::{Delegation, EnvelopeContent, SignedDelegation};
use candid::Principal;

mod anonymous;
mod basic;
mod delegated;
mod prime256v1;
mod secp256k1;

pub use anonymous::AnonymousIdentity;
pub use basic::BasicIdentity;
pub use delegated::DelegatedIdentity;
pub use prime256v1::Prime256v1Identity;
pub use secp256k1::Secp256k1Identity;

/// The DER prefix of an Ed25519 public key (RFC 8410).
pub const ED25519_DER_PREFIX: [u8; 12] = [48, 42, 48, 5, 6, 3, 43, 101, 112, 3, 33, 0];

/// The size of a DER-encoded Ed25519 public key.
pub const ED25519_PUBLIC_KEY_DER_SIZE: usize = ED25519_DER_PREFIX.len() + 32;

/// The authentication fields of an envelope.
///
/// All fields are `None` for the anonymous identity.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Signature {
    /// The DER-encoded public key the signature verifies under.
    pub public_key: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    /// The delegations from `public_key` to the key that actually signed.
    pub delegations: Option<Vec<SignedDelegation>>,
}

/// A signer of requests.
pub trait Identity: Send + Sync {
    /// The principal the requests are sent on behalf of.
    fn sender(&self) -> Result<Principal, String>;

    /// The DER-encoded public key, `None` for the anonymous identity.
    fn public_key(&self) -> Option<Vec<u8>>;

    /// Signs arbitrary bytes.
    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String>;

    /// Signs the request id of `content`, prefixed with the request domain
    /// separator.
    fn sign(&self, content: &EnvelopeContent) -> Result<Signature, String> {
        let request_id = content.to_request_id().map_err(|e| e.to_string())?;
        self.sign_arbitrary(&request_id.signable())
    }

    /// Signs a delegation to another key.
    fn sign_delegation(&self, delegation: &Delegation) -> Result<Signature, String> {
        let signable = delegation.signable().map_err(|e| e.to_string())?;
        self.sign_arbitrary(&signable)
    }

    /// The delegations presented with every signature.
    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        vec![]
    }
}

impl<I: Identity + ?Sized> Identity for Box<I> {
    fn sender(&self) -> Result<Principal, String> {
        (**self).sender()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        (**self).public_key()
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        (**self).sign_arbitrary(content)
    }

    fn sign(&self, content: &EnvelopeContent) -> Result<Signature, String> {
        (**self).sign(content)
    }

    fn sign_delegation(&self, delegation: &Delegation) -> Result<Signature, String> {
        (**self).sign_delegation(delegation)
    }

    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        (**self).delegation_chain()
    }
}

impl<I: Identity + ?Sized> Identity for std::sync::Arc<I> {
    fn sender(&self) -> Result<Principal, String> {
        (**self).sender()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        (**self).public_key()
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        (**self).sign_arbitrary(content)
    }

    fn sign(&self, content: &EnvelopeContent) -> Result<Signature, String> {
        (**self).sign(content)
    }

    fn sign_delegation(&self, delegation: &Delegation) -> Result<Signature, String> {
        (**self).sign_delegation(delegation)
    }

    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        (**self).delegation_chain()
    }
}
