use super::{Identity, Signature};
use candid::Principal;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::SigningKey;
use p256::pkcs8::EncodePublicKey;
use std::fmt;

/// An ECDSA identity on prime256v1 (NIST P-256), signing SHA-256 digests.
#[derive(Clone)]
pub struct Prime256v1Identity {
    key: SigningKey,
    der_encoded_public_key: Vec<u8>,
}

impl fmt::Debug for Prime256v1Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prime256v1Identity")
            .field("public_key", &hex::encode(&self.der_encoded_public_key))
            .finish_non_exhaustive()
    }
}

impl Prime256v1Identity {
    pub fn from_signing_key(key: SigningKey) -> Result<Self, String> {
        let der_encoded_public_key = p256::PublicKey::from(key.verifying_key())
            .to_public_key_der()
            .map_err(|e| format!("failed to DER-encode the prime256v1 public key: {}", e))?
            .into_vec();
        Ok(Self {
            key,
            der_encoded_public_key,
        })
    }
}

impl Identity for Prime256v1Identity {
    fn sender(&self) -> Result<Principal, String> {
        Ok(Principal::self_authenticating(&self.der_encoded_public_key))
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_encoded_public_key.clone())
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        let signature: p256::ecdsa::Signature = self
            .key
            .try_sign(content)
            .map_err(|e| format!("prime256v1 signing failed: {}", e))?;
        Ok(Signature {
            public_key: self.public_key(),
            signature: Some(signature.to_bytes().to_vec()),
            delegations: None,
        })
    }
}
