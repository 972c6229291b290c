//! Representation-independent hashing of request records.
//!
//! Every request sent to the Internet Computer is identified by its request
//! id: a SHA-256 digest over the record's fields that does not depend on the
//! order of the fields or on the wire encoding. The request id, prefixed
//! with a domain separator, is what the sender signs.
//!
//! Any `Serialize` record can be hashed with [`to_request_id`]. Field values
//! are hashed according to their type: unsigned integers as LEB128, byte
//! strings and strings as their bytes, sequences as the digest of the
//! concatenated element hashes, and nested records as their own request id.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod serializer;
mod value;


/// The domain separator prefixed to a request id before signing it.
pub const IC_REQUEST_DOMAIN_SEPARATOR: &[u8; 11] = b"\x0Aic-request";

/// The length of a [`RequestId`].
pub const REQUEST_ID_LENGTH: usize = 32;

/// The id of a request: the representation-independent hash of its content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId([u8; REQUEST_ID_LENGTH]);

impl RequestId {
    pub fn new(bytes: &[u8; REQUEST_ID_LENGTH]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; REQUEST_ID_LENGTH] {
        &self.0
    }

    /// The bytes that are signed to authenticate the request.
    pub fn signable(&self) -> Vec<u8> {
        let mut signable = Vec::with_capacity(IC_REQUEST_DOMAIN_SEPARATOR.len() + REQUEST_ID_LENGTH);
        signable.extend_from_slice(IC_REQUEST_DOMAIN_SEPARATOR);
        signable.extend_from_slice(&self.0);
        signable
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId(0x{})", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for RequestId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; REQUEST_ID_LENGTH]> for RequestId {
    fn from(bytes: [u8; REQUEST_ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RequestId {
    type Error = RequestIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; REQUEST_ID_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| RequestIdError::InvalidLength {
                    given_length: bytes.len(),
                    expected_length: REQUEST_ID_LENGTH,
                })?;
        Ok(Self(array))
    }
}

impl FromStr for RequestId {
    type Err = RequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| RequestIdError::InvalidHex(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

// `[u8; 32]` cannot use `#[serde(with = "serde_bytes")]` with derive, so
// Serialize/Deserialize are implemented by hand.
impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        RequestId::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

/// Errors computing or decoding a request id.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum RequestIdError {
    #[error("a custom error happened inside the serializer: {0}")]
    CustomSerdeError(String),

    #[error("values of type {0} cannot be part of a request id")]
    UnsupportedType(&'static str),

    #[error("record field names must be strings or byte strings")]
    InvalidMapKey,

    #[error("only records can be hashed into a request id")]
    NotARecord,

    #[error(
        "expected a request id of length {expected_length} bytes, but got {given_length} bytes"
    )]
    InvalidLength {
        given_length: usize,
        expected_length: usize,
    },

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl serde::ser::Error for RequestIdError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        RequestIdError::CustomSerdeError(msg.to_string())
    }
}

/// Derives the request id of a record.
///
/// Fields whose value is `None` are left out. Fails if `record` does not
/// serialize as a struct or map, or contains values that have no request id
/// representation.
pub fn to_request_id<T: Serialize + ?Sized>(record: &T) -> Result<RequestId, RequestIdError> {
    match record.serialize(serializer::ValueSerializer)? {
        Some(value::RequestIdValue::Map(fields)) => Ok(RequestId(value::hash_of_map(&fields))),
        _ => Err(RequestIdError::NotARecord),
    }
}
