//! Digest computation and lookups on `HashTree` structures.

use crate::hasher::Hasher;
use crate::{Digest, HashTree, Label, LookupError, Path};
use std::cmp::Ordering;


const DOMAIN_HASHTREE_LEAF: &str = "ic-hashtree-leaf";
const DOMAIN_HASHTREE_EMPTY_SUBTREE: &str = "ic-hashtree-empty";
const DOMAIN_HASHTREE_NODE: &str = "ic-hashtree-labeled";
const DOMAIN_HASHTREE_FORK: &str = "ic-hashtree-fork";

// Helpers for creation of domain-separated hashers.
fn new_leaf_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_LEAF)
}

fn new_fork_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_FORK)
}

fn new_node_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_NODE)
}

pub(crate) fn empty_subtree_hash() -> Digest {
    Hasher::for_domain(DOMAIN_HASHTREE_EMPTY_SUBTREE).finalize()
}

pub(crate) fn compute_leaf_digest(contents: &[u8]) -> Digest {
    let mut hasher = new_leaf_hasher();
    hasher.update(contents);
    hasher.finalize()
}

pub(crate) fn compute_node_digest(label: &Label, subtree_digest: &Digest) -> Digest {
    let mut hasher = new_node_hasher();
    hasher.update(label.as_bytes());
    hasher.update(&subtree_digest.0);
    hasher.finalize()
}

pub(crate) fn compute_fork_digest(left_digest: &Digest, right_digest: &Digest) -> Digest {
    let mut hasher = new_fork_hasher();
    hasher.update(&left_digest.0);
    hasher.update(&right_digest.0);
    hasher.finalize()
}

/// The outcome of looking up a value in a `HashTree`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LookupResult<'a> {
    /// The path ends at a leaf with this value.
    Found(&'a [u8]),
    /// The tree proves that the path does not exist.
    Absent,
    /// The path leads into a pruned subtree, so its existence cannot be decided.
    Unknown,
    /// The path ends at a fork or labeled node rather than a leaf.
    Error,
}

/// The outcome of looking up a subtree in a `HashTree`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubtreeLookupResult<'a> {
    Found(&'a HashTree),
    Absent,
    Unknown,
}

// Result of searching a single label among the labeled children of a fork
// structure. `Less` and `Greater` report that the sought label sorts before
// or after every label seen, which lets a parent fork continue the search in
// the right sibling or conclude absence. `Empty` reports a subtree without
// any labels, which forks skip over.
enum LookupLabelResult<'a> {
    Found(&'a HashTree),
    Absent,
    Unknown,
    Less,
    Greater,
    Empty,
}

impl HashTree {
    /// Recomputes the root digest of the tree.
    pub fn digest(&self) -> Digest {
        match self {
            HashTree::Empty => empty_subtree_hash(),
            HashTree::Fork(lr) => compute_fork_digest(&lr.0.digest(), &lr.1.digest()),
            HashTree::Labeled(label, subtree) => compute_node_digest(label, &subtree.digest()),
            HashTree::Leaf(value) => compute_leaf_digest(value),
            HashTree::Pruned(digest) => *digest,
        }
    }

    fn lookup_label(&self, label: &[u8]) -> LookupLabelResult<'_> {
        match self {
            HashTree::Labeled(node_label, subtree) => match label.cmp(node_label.as_bytes()) {
                Ordering::Greater => LookupLabelResult::Greater,
                Ordering::Equal => LookupLabelResult::Found(subtree),
                Ordering::Less => LookupLabelResult::Less,
            },
            HashTree::Fork(lr) => match lr.0.lookup_label(label) {
                LookupLabelResult::Empty => lr.1.lookup_label(label),
                LookupLabelResult::Greater => match lr.1.lookup_label(label) {
                    // Past every label on the left, before every label on the right.
                    LookupLabelResult::Less => LookupLabelResult::Absent,
                    LookupLabelResult::Empty => LookupLabelResult::Greater,
                    result => result,
                },
                LookupLabelResult::Unknown => match lr.1.lookup_label(label) {
                    // The label could still be hidden in the pruned left part.
                    LookupLabelResult::Less | LookupLabelResult::Empty => {
                        LookupLabelResult::Unknown
                    }
                    result => result,
                },
                result => result,
            },
            HashTree::Pruned(_) => LookupLabelResult::Unknown,
            HashTree::Empty => LookupLabelResult::Empty,
            HashTree::Leaf(_) => LookupLabelResult::Absent,
        }
    }

    /// Follows `path` down the tree and returns the leaf value at its end.
    pub fn lookup_path<L: AsRef<[u8]>>(&self, path: &[L]) -> LookupResult<'_> {
        match path.split_first() {
            None => match self {
                HashTree::Leaf(value) => LookupResult::Found(value),
                HashTree::Empty => LookupResult::Absent,
                HashTree::Pruned(_) => LookupResult::Unknown,
                HashTree::Labeled(_, _) | HashTree::Fork(_) => LookupResult::Error,
            },
            Some((label, rest)) => match self.lookup_label(label.as_ref()) {
                LookupLabelResult::Found(subtree) => subtree.lookup_path(rest),
                LookupLabelResult::Unknown => LookupResult::Unknown,
                LookupLabelResult::Absent
                | LookupLabelResult::Less
                | LookupLabelResult::Greater
                | LookupLabelResult::Empty => LookupResult::Absent,
            },
        }
    }

    /// Follows `path` down the tree and returns the subtree rooted at its end.
    pub fn lookup_subtree<L: AsRef<[u8]>>(&self, path: &[L]) -> SubtreeLookupResult<'_> {
        match path.split_first() {
            None => match self {
                HashTree::Empty => SubtreeLookupResult::Absent,
                HashTree::Pruned(_) => SubtreeLookupResult::Unknown,
                _ => SubtreeLookupResult::Found(self),
            },
            Some((label, rest)) => match self.lookup_label(label.as_ref()) {
                LookupLabelResult::Found(subtree) => subtree.lookup_subtree(rest),
                LookupLabelResult::Unknown => SubtreeLookupResult::Unknown,
                LookupLabelResult::Absent
                | LookupLabelResult::Less
                | LookupLabelResult::Greater
                | LookupLabelResult::Empty => SubtreeLookupResult::Absent,
            },
        }
    }

    /// Like `lookup_path`, but reports a missing value as a `LookupError`
    /// carrying the path.
    pub fn lookup_value<L: AsRef<[u8]>>(&self, path: &[L]) -> Result<&[u8], LookupError> {
        match self.lookup_path(path) {
            LookupResult::Found(value) => Ok(value),
            LookupResult::Absent => Err(LookupError::Absent {
                path: to_path(path),
            }),
            LookupResult::Unknown => Err(LookupError::Unknown {
                path: to_path(path),
            }),
            LookupResult::Error => Err(LookupError::Error {
                path: to_path(path),
            }),
        }
    }

    /// Like `lookup_subtree`, but reports a missing subtree as a
    /// `LookupError` carrying the path.
    pub fn lookup_tree<L: AsRef<[u8]>>(&self, path: &[L]) -> Result<&HashTree, LookupError> {
        match self.lookup_subtree(path) {
            SubtreeLookupResult::Found(subtree) => Ok(subtree),
            SubtreeLookupResult::Absent => Err(LookupError::Absent {
                path: to_path(path),
            }),
            SubtreeLookupResult::Unknown => Err(LookupError::Unknown {
                path: to_path(path),
            }),
        }
    }

    /// Lists the paths of all leaves in the tree, in tree order.
    ///
    /// Pruned and empty subtrees contribute no paths.
    pub fn list_paths(&self) -> Vec<Vec<Label>> {
        let mut paths = Vec::new();
        let mut curr_path = Vec::new();
        self.collect_paths(&mut curr_path, &mut paths);
        paths
    }

    fn collect_paths(&self, curr_path: &mut Vec<Label>, paths: &mut Vec<Vec<Label>>) {
        match self {
            HashTree::Empty | HashTree::Pruned(_) => {}
            HashTree::Leaf(_) => paths.push(curr_path.clone()),
            HashTree::Fork(lr) => {
                lr.0.collect_paths(curr_path, paths);
                lr.1.collect_paths(curr_path, paths);
            }
            HashTree::Labeled(label, subtree) => {
                curr_path.push(label.clone());
                subtree.collect_paths(curr_path, paths);
                curr_path.pop();
            }
        }
    }
}

fn to_path<L: AsRef<[u8]>>(path: &[L]) -> Path {
    path.iter().map(|label| Label::from(label.as_ref())).collect()
}
