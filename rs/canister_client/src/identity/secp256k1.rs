use super::{Identity, Signature};
use candid::Principal;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::SigningKey;
use k256::pkcs8::EncodePublicKey;
use std::fmt;

/// An ECDSA identity on secp256k1, signing SHA-256 digests.
#[derive(Clone)]
pub struct Secp256k1Identity {
    key: SigningKey,
    der_encoded_public_key: Vec<u8>,
}

impl fmt::Debug for Secp256k1Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1Identity")
            .field("public_key", &hex::encode(&self.der_encoded_public_key))
            .finish_non_exhaustive()
    }
}

impl Secp256k1Identity {
    pub fn from_signing_key(key: SigningKey) -> Result<Self, String> {
        let der_encoded_public_key = k256::PublicKey::from(key.verifying_key())
            .to_public_key_der()
            .map_err(|e| format!("failed to DER-encode the secp256k1 public key: {}", e))?
            .into_vec();
        Ok(Self {
            key,
            der_encoded_public_key,
        })
    }
}

impl Identity for Secp256k1Identity {
    fn sender(&self) -> Result<Principal, String> {
        Ok(Principal::self_authenticating(&self.der_encoded_public_key))
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_encoded_public_key.clone())
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        let signature: k256::ecdsa::Signature = self
            .key
            .try_sign(content)
            .map_err(|e| format!("secp256k1 signing failed: {}", e))?;
        Ok(Signature {
            public_key: self.public_key(),
            signature: Some(signature.to_bytes().to_vec()),
            delegations: None,
        })
    }
}
