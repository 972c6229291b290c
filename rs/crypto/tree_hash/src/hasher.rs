use crate::Digest;
use sha2::{Digest as _, Sha256};

/// A SHA-256 hasher whose state is seeded with a length-prefixed domain
/// separator.
pub(crate) struct Hasher(Sha256);

impl Hasher {
    pub(crate) fn for_domain(domain: &str) -> Self {
        debug_assert!(domain.len() < 256);
        let mut sha256 = Sha256::new();
        sha256.update([domain.len() as u8]);
        sha256.update(domain.as_bytes());
        Self(sha256)
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub(crate) fn finalize(self) -> Digest {
        Digest(self.0.finalize().into())
    }
}
