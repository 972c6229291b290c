use super::{Identity, Signature};
use crate::envelope::SignedDelegation;
use candid::Principal;

/// An identity that signs with a session key on behalf of another key.
///
/// The sender is derived from `from_key`, and every signature presents the
/// chain of delegations that leads from `from_key` to the key of `to`.
pub struct DelegatedIdentity {
    to: Box<dyn Identity>,
    chain: Vec<SignedDelegation>,
    from_key: Vec<u8>,
}

impl DelegatedIdentity {
    pub fn new(from_key: Vec<u8>, to: Box<dyn Identity>, chain: Vec<SignedDelegation>) -> Self {
        Self {
            to,
            chain,
            from_key,
        }
    }
}

impl Identity for DelegatedIdentity {
    fn sender(&self) -> Result<Principal, String> {
        Ok(Principal::self_authenticating(&self.from_key))
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.from_key.clone())
    }

    fn sign_arbitrary(&self, content: &[u8]) -> Result<Signature, String> {
        let signature = self.to.sign_arbitrary(content)?;
        Ok(Signature {
            public_key: self.public_key(),
            signature: signature.signature,
            delegations: Some(self.chain.clone()),
        })
    }

    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        self.chain.clone()
    }
}
