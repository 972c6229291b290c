use super::{Identity, Signature, ED25519_DER_PREFIX};
use candid::Principal;
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;

/// An Ed25519 identity.
#[derive(Clone)]
pub struct BasicIdentity {
    key: SigningKey,
    der_encoded_public_key: Vec<u8>,
}

impl fmt::Debug for BasicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicIdentity")
            .field("public_key", &hex::encode(&self.der_encoded_public_key))
            .finish_non_exhaustive()
    }
}

impl BasicIdentity {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let mut der_encoded_public_key = ED25519_DER_PREFIX.to_vec();
        der_encoded_public_key.extend_from_slice(key.verifying_key().as_bytes());
        Self {
            key,
            der_encoded_public_key,
        }
    }

    /// Creates an identity from a raw 32-byte Ed25519 secret key.
    pub fn from_secret_key_bytes(bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }
}

impl Identity for BasicIdentity {
    fn sender(&self) -> Result<Principal, String> {
        Ok(Principal::self_authenticating(&self.der_encoded_public_key))
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_encoded_public_key.clone())
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        let signature = self.key.sign(content);
        Ok(Signature {
            public_key: self.public_key(),
            signature: Some(signature.to_bytes().to_vec()),
            delegations: None,
        })
    }
}
