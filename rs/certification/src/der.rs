//! Conversions between raw BLS12-381 public keys and their DER encoding.

use crate::CertificateValidationError;

/// The length of a raw (compressed G2) BLS12-381 public key.
pub const PUBLIC_KEY_SIZE: usize = 96;

// DER header: SEQUENCE { SEQUENCE { OID bls-signature, OID bls12-381-g2 },
// BIT STRING (96 bytes) }.
const DER_PREFIX: [u8; 37] = [
    0x30, 0x81, 0x82, 0x30, 0x1d, 0x06, 0x0d, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xdc, 0x7c,
    0x05, 0x03, 0x01, 0x02, 0x01, 0x06, 0x0c, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xdc, 0x7c,
    0x05, 0x03, 0x02, 0x01, 0x03, 0x61, 0x00,
];

const DER_LENGTH: usize = DER_PREFIX.len() + PUBLIC_KEY_SIZE;

/// DER-encodes a raw BLS12-381 public key.
pub fn public_key_to_der(key: &[u8; PUBLIC_KEY_SIZE]) -> Vec<u8> {
    let mut der = Vec::with_capacity(DER_LENGTH);
    der.extend_from_slice(&DER_PREFIX);
    der.extend_from_slice(key);
    der
}

/// Extracts the raw BLS12-381 public key from its DER encoding.
///
/// Only checks the encoding, not whether the key is a valid curve point.
pub fn public_key_from_der(der: &[u8]) -> Result<[u8; PUBLIC_KEY_SIZE], CertificateValidationError> {
    if der.len() != DER_LENGTH {
        return Err(CertificateValidationError::DerKeyLengthMismatch {
            expected: DER_LENGTH,
            actual: der.len(),
        });
    }
    let (prefix, key) = der.split_at(DER_PREFIX.len());
    if prefix != DER_PREFIX {
        return Err(CertificateValidationError::DerPrefixMismatch {
            expected: DER_PREFIX.to_vec(),
            actual: prefix.to_vec(),
        });
    }
    let mut raw = [0u8; PUBLIC_KEY_SIZE];
    raw.copy_from_slice(key);
    Ok(raw)
}
