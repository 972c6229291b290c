use super::{Identity, Signature};
use candid::Principal;

/// The identity of unauthenticated callers. Its requests carry no signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn sender(&self) -> Result<Principal, String> {
        Ok(Principal::anonymous())
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }

    fn sign_arbitrary(&self, _content: &[u8]) -> Result<Signature, String> {
        Ok(Signature::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeContent;

    #[test]
    fn should_sign_nothing() {
        let content = EnvelopeContent::ReadState {
            ingress_expiry: 1,
            sender: Principal::anonymous(),
            paths: vec![],
        };

        assert_eq!(AnonymousIdentity.sender(), Ok(Principal::anonymous()));
        assert_eq!(AnonymousIdentity.sign(&content), Ok(Signature::default()));
    }
}
