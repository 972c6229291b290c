//! Verification of BLS12-381 signatures (signatures in G1, public keys in G2).

use crate::der::PUBLIC_KEY_SIZE;
use crate::CertificateValidationError;
use ic_bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use ic_bls12_381::{pairing, G1Affine, G1Projective, G2Affine};

/// The domain separation tag used to hash messages to G1.
pub const BLS_SIGNATURE_DST: &[u8; 43] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// The length of a compressed G1 signature.
pub const SIGNATURE_SIZE: usize = 48;

fn hash_to_g1(msg: &[u8]) -> G1Affine {
    let point =
        <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(msg, BLS_SIGNATURE_DST);
    G1Affine::from(point)
}

/// Verifies the BLS signature `signature` on `msg` under the raw public key
/// `public_key`.
pub fn verify_bls_signature(
    signature: &[u8],
    msg: &[u8],
    public_key: &[u8; PUBLIC_KEY_SIZE],
) -> Result<(), CertificateValidationError> {
    let signature: &[u8; SIGNATURE_SIZE] =
        signature
            .try_into()
            .map_err(|_| CertificateValidationError::MalformedSignature {
                reason: format!(
                    "expected {} bytes, got {}",
                    SIGNATURE_SIZE,
                    signature.len()
                ),
            })?;
    // A signature that is not a point on G1 cannot verify under any key.
    let signature = Option::<G1Affine>::from(G1Affine::from_compressed(signature))
        .ok_or(CertificateValidationError::VerificationFailed)?;
    let public_key = Option::<G2Affine>::from(G2Affine::from_compressed(public_key))
        .filter(|pk| !bool::from(pk.is_identity()))
        .ok_or(CertificateValidationError::MalformedPublicKey)?;

    if pairing(&signature, &G2Affine::generator()) == pairing(&hash_to_g1(msg), &public_key) {
        Ok(())
    } else {
        Err(CertificateValidationError::VerificationFailed)
    }
}
