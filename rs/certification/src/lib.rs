#![deny(clippy::unwrap_used)]

//! Verification of certificates issued by the Internet Computer.
//!
//! A certificate is a hash tree together with a BLS signature on the tree's
//! root hash. The signature is made either directly by the root subnet, in
//! which case it verifies under the pinned root key, or by another subnet
//! whose key and authorized canister ranges are themselves certified by the
//! root subnet through a delegation.

use candid::Principal;
use ic_crypto_tree_hash::{HashTree, LookupError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod bls;
mod der;
mod ranges;

pub use bls::{verify_bls_signature, BLS_SIGNATURE_DST, SIGNATURE_SIZE};
pub use der::{public_key_from_der, public_key_to_der, PUBLIC_KEY_SIZE};
pub use ranges::{principal_is_within_ranges, PrincipalRange};

/// The domain separator prefixed to a certificate's root hash before
/// signing it.
pub const IC_STATE_ROOT_DOMAIN_SEPARATOR: &[u8; 14] = b"\x0Dic-state-root";

/// A certified hash tree.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Certificate {
    /// The (pruned) state tree.
    pub tree: HashTree,

    /// The BLS signature on the tree's root hash.
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,

    /// Present if the certificate was signed by a subnet other than the root
    /// subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<CertificateDelegation>,
}

/// The root subnet's authorization of another subnet to sign certificates.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CertificateDelegation {
    /// The id of the delegated subnet.
    pub subnet_id: Principal,

    /// A CBOR-encoded certificate that contains the subnet's public key and
    /// canister ranges.
    #[serde(with = "serde_bytes")]
    pub certificate: Vec<u8>,
}

/// Reasons a certificate may be rejected.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum CertificateValidationError {
    /// The signature does not verify under the resolved key.
    #[error("certificate verification failed")]
    VerificationFailed,

    /// The certificate was signed by a subnet that may not certify the
    /// canister.
    #[error("subnet {subnet_id} is not authorized to answer for canister {canister_id}")]
    NotAuthorized {
        canister_id: Principal,
        subnet_id: Principal,
    },

    #[error("the DER-encoded public key has {actual} bytes, expected {expected}")]
    DerKeyLengthMismatch { expected: usize, actual: usize },

    #[error(
        "the DER-encoded public key has prefix {}, expected {}",
        hex::encode(actual),
        hex::encode(expected)
    )]
    DerPrefixMismatch { expected: Vec<u8>, actual: Vec<u8> },

    /// A delegation certificate that carries a delegation of its own.
    #[error("the delegation certificate for subnet {subnet_id} is itself delegated")]
    NestedDelegation { subnet_id: Principal },

    #[error("malformed signature: {reason}")]
    MalformedSignature { reason: String },

    #[error("the public key is not a valid BLS12-381 G2 point")]
    MalformedPublicKey,

    #[error("invalid CBOR data: {0}")]
    InvalidCborData(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl Certificate {
    /// Decodes a certificate from CBOR, with or without the self-describe
    /// tag.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, CertificateValidationError> {
        serde_cbor::from_slice(bytes)
            .map_err(|e| CertificateValidationError::InvalidCborData(e.to_string()))
    }

    /// The message the certificate's signature is on.
    pub fn signed_message(&self) -> Vec<u8> {
        let root_hash = self.tree.digest();
        let mut msg = Vec::with_capacity(IC_STATE_ROOT_DOMAIN_SEPARATOR.len() + 32);
        msg.extend_from_slice(IC_STATE_ROOT_DOMAIN_SEPARATOR);
        msg.extend_from_slice(root_hash.as_bytes());
        msg
    }
}

/// Verifies `certificate` against the DER-encoded root public key.
///
/// If the certificate carries a delegation, the delegation certificate is
/// verified first under the root key, then the delegated subnet's public key
/// is read from it and, unless `disable_range_check` is set,
/// `effective_canister_id` must lie within the subnet's canister ranges.
/// Only then is the signature checked under the subnet's key.
pub fn verify_certificate(
    certificate: &Certificate,
    effective_canister_id: &Principal,
    root_key_der: &[u8],
    disable_range_check: bool,
) -> Result<(), CertificateValidationError> {
    let signing_key_der = resolve_signing_key(
        certificate.delegation.as_ref(),
        effective_canister_id,
        root_key_der,
        disable_range_check,
    )?;
    let signing_key = public_key_from_der(&signing_key_der)?;
    verify_bls_signature(
        &certificate.signature,
        &certificate.signed_message(),
        &signing_key,
    )
}

/// Decodes a CBOR certificate and verifies it with [`verify_certificate`].
pub fn verify_certificate_cbor(
    certificate: &[u8],
    effective_canister_id: &Principal,
    root_key_der: &[u8],
    disable_range_check: bool,
) -> Result<Certificate, CertificateValidationError> {
    let certificate = Certificate::from_cbor(certificate)?;
    verify_certificate(
        &certificate,
        effective_canister_id,
        root_key_der,
        disable_range_check,
    )?;
    Ok(certificate)
}

// Returns the DER-encoded key that must have signed a certificate with the
// given delegation.
fn resolve_signing_key(
    delegation: Option<&CertificateDelegation>,
    effective_canister_id: &Principal,
    root_key_der: &[u8],
    disable_range_check: bool,
) -> Result<Vec<u8>, CertificateValidationError> {
    let delegation = match delegation {
        None => return Ok(root_key_der.to_vec()),
        Some(delegation) => delegation,
    };
    // Only the root subnet delegates, so the chain is at most one link long.
    let delegation_certificate = Certificate::from_cbor(&delegation.certificate)?;
    if delegation_certificate.delegation.is_some() {
        return Err(CertificateValidationError::NestedDelegation {
            subnet_id: delegation.subnet_id,
        });
    }
    verify_bls_signature(
        &delegation_certificate.signature,
        &delegation_certificate.signed_message(),
        &public_key_from_der(root_key_der)?,
    )?;
    let subnet_id = delegation.subnet_id.as_slice();

    if !disable_range_check {
        let ranges = lookup_canister_ranges(&delegation_certificate.tree, &delegation.subnet_id)?;
        if !principal_is_within_ranges(effective_canister_id, &ranges) {
            return Err(CertificateValidationError::NotAuthorized {
                canister_id: *effective_canister_id,
                subnet_id: delegation.subnet_id,
            });
        }
    }

    let public_key_path: [&[u8]; 3] = [b"subnet", subnet_id, b"public_key"];
    let public_key = delegation_certificate.tree.lookup_value(&public_key_path)?;
    Ok(public_key.to_vec())
}

/// Reads the canister ranges of `subnet_id` from a certified tree.
pub fn lookup_canister_ranges(
    tree: &HashTree,
    subnet_id: &Principal,
) -> Result<Vec<PrincipalRange>, CertificateValidationError> {
    let path: [&[u8]; 3] = [b"subnet", subnet_id.as_slice(), b"canister_ranges"];
    let ranges = tree.lookup_value(&path)?;
    serde_cbor::from_slice(ranges)
        .map_err(|e| CertificateValidationError::InvalidCborData(e.to_string()))
}
