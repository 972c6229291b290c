//! Partially pruned hash trees as returned in certificates, together with
//! their digest computation and label-ordered lookups.
//!
//! A [`HashTree`] is a binary tree of forks whose leaves are either labeled
//! subtrees, raw values, empty subtrees or pruned subtrees that only retain
//! their digest. Labels below a common fork are sorted, which lets a lookup
//! conclude that a label is absent without seeing the whole tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod encoding;
mod hasher;
mod tree_hash;

#[cfg(test)]
mod arbitrary;

pub use tree_hash::{LookupResult, SubtreeLookupResult};

/// A SHA-256 digest of a (sub)tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The name of a tree edge.
///
/// Labels are ordered by unsigned lexicographic comparison of their bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(#[serde(with = "serde_bytes")] Vec<u8>);

impl Label {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Label {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Label {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Label {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Label {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

fn is_printable(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic())
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_printable(&self.0) {
            // Checked above that every byte is ASCII.
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x{}", hex::encode(&self.0))
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A sequence of labels leading from the root of a tree to a node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Label>);

impl Path {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    pub fn into_vec(self) -> Vec<Label> {
        self.0
    }
}

impl std::ops::Deref for Path {
    type Target = [Label];

    fn deref(&self) -> &[Label] {
        &self.0
    }
}

impl From<Vec<Label>> for Path {
    fn from(labels: Vec<Label>) -> Self {
        Self(labels)
    }
}

impl<L: Into<Label>> FromIterator<L> for Path {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self)
    }
}

/// A possibly pruned hash tree.
///
/// The digest of a tree only depends on its shape, labels and leaf values,
/// and pruning a subtree (replacing it by `Pruned(subtree.digest())`) keeps
/// the digest unchanged.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum HashTree {
    Empty,
    Fork(Box<(HashTree, HashTree)>),
    Labeled(Label, Box<HashTree>),
    Leaf(Vec<u8>),
    Pruned(Digest),
}

impl HashTree {
    pub fn empty() -> Self {
        HashTree::Empty
    }

    pub fn fork(left: HashTree, right: HashTree) -> Self {
        HashTree::Fork(Box::new((left, right)))
    }

    pub fn labeled(label: impl Into<Label>, subtree: HashTree) -> Self {
        HashTree::Labeled(label.into(), Box::new(subtree))
    }

    pub fn leaf(value: impl Into<Vec<u8>>) -> Self {
        HashTree::Leaf(value.into())
    }

    pub fn pruned(digest: Digest) -> Self {
        HashTree::Pruned(digest)
    }
}

/// A lookup that did not find a value, with the path that was looked up.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum LookupError {
    /// The tree proves that the path does not exist.
    #[error("the path {path} is absent from the tree")]
    Absent { path: Path },

    /// The path leads into a pruned part of the tree.
    #[error("the tree does not contain enough information to look up the path {path}")]
    Unknown { path: Path },

    /// The path ends at an inner node instead of a value.
    #[error("the path {path} does not end at a leaf")]
    Error { path: Path },
}

impl LookupError {
    pub fn path(&self) -> &Path {
        match self {
            LookupError::Absent { path }
            | LookupError::Unknown { path }
            | LookupError::Error { path } => path,
        }
    }
}
