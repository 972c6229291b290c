//! CBOR-compatible serde encoding of `HashTree`.
//!
//! Each node is encoded as an array whose first element is the node tag:
//!
//! ```text
//! [0]                       Empty
//! [1, left, right]          Fork
//! [2, label, subtree]       Labeled
//! [3, value]                Leaf
//! [4, digest]               Pruned
//! ```

use crate::{Digest, HashTree, Label};
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};
use std::fmt;

const EMPTY_TAG: u8 = 0;
const FORK_TAG: u8 = 1;
const LABELED_TAG: u8 = 2;
const LEAF_TAG: u8 = 3;
const PRUNED_TAG: u8 = 4;

impl Serialize for HashTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            HashTree::Empty => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&EMPTY_TAG)?;
                seq.end()
            }
            HashTree::Fork(lr) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&FORK_TAG)?;
                seq.serialize_element(&lr.0)?;
                seq.serialize_element(&lr.1)?;
                seq.end()
            }
            HashTree::Labeled(label, subtree) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&LABELED_TAG)?;
                seq.serialize_element(Bytes::new(label.as_bytes()))?;
                seq.serialize_element(subtree)?;
                seq.end()
            }
            HashTree::Leaf(value) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&LEAF_TAG)?;
                seq.serialize_element(Bytes::new(value))?;
                seq.end()
            }
            HashTree::Pruned(digest) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&PRUNED_TAG)?;
                seq.serialize_element(Bytes::new(&digest.0))?;
                seq.end()
            }
        }
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = ByteBuf::deserialize(deserializer)?;
        let digest: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::invalid_length(bytes.len(), &"a 32-byte digest"))?;
        Ok(Digest(digest))
    }
}

struct HashTreeVisitor;

fn next_element<'de, A, T>(seq: &mut A, index: usize) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, &"a complete hash tree node"))
}

impl<'de> Visitor<'de> for HashTreeVisitor {
    type Value = HashTree;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "a hash tree node: an array starting with a tag in 0..=4"
        )
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let tag: u8 = next_element(&mut seq, 0)?;
        let (tree, len) = match tag {
            EMPTY_TAG => (HashTree::Empty, 1),
            FORK_TAG => {
                let left: HashTree = next_element(&mut seq, 1)?;
                let right: HashTree = next_element(&mut seq, 2)?;
                (HashTree::fork(left, right), 3)
            }
            LABELED_TAG => {
                let label: ByteBuf = next_element(&mut seq, 1)?;
                let subtree: HashTree = next_element(&mut seq, 2)?;
                (HashTree::labeled(Label::from(label.into_vec()), subtree), 3)
            }
            LEAF_TAG => {
                let value: ByteBuf = next_element(&mut seq, 1)?;
                (HashTree::Leaf(value.into_vec()), 2)
            }
            PRUNED_TAG => {
                let digest: Digest = next_element(&mut seq, 1)?;
                (HashTree::Pruned(digest), 2)
            }
            _ => {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Unsigned(tag as u64),
                    &"a hash tree node tag in 0..=4",
                ))
            }
        };
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(
                len + 1,
                &"no trailing elements in a hash tree node",
            ));
        }
        Ok(tree)
    }
}

impl<'de> Deserialize<'de> for HashTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(HashTreeVisitor)
    }
}
