use crate::{Digest, HashTree, Label};
use proptest::prelude::*;

// Labels are made unique and increasing in depth-first order by prefixing
// them with a counter, which keeps every fork's labels sorted.
fn number_labels(tree: HashTree, next: &mut u64) -> HashTree {
    match tree {
        HashTree::Fork(lr) => {
            let (left, right) = *lr;
            let left = number_labels(left, next);
            HashTree::fork(left, number_labels(right, next))
        }
        HashTree::Labeled(label, subtree) => {
            let mut bytes = next.to_be_bytes().to_vec();
            bytes.extend_from_slice(label.as_bytes());
            *next += 1;
            HashTree::Labeled(Label::from(bytes), Box::new(number_labels(*subtree, next)))
        }
        other => other,
    }
}

/// Well-formed trees of any shape, including pruned and empty nodes.
pub(crate) fn arbitrary_hash_tree() -> impl Strategy<Value = HashTree> {
    let terminal = prop_oneof![
        Just(HashTree::Empty),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(HashTree::Leaf),
        any::<[u8; 32]>().prop_map(|bytes| HashTree::Pruned(Digest(bytes))),
    ];
    terminal
        .prop_recursive(6, 128, 2, |subtree| {
            prop_oneof![
                (subtree.clone(), subtree.clone()).prop_map(|(l, r)| HashTree::fork(l, r)),
                ("[a-z]{0,8}", subtree).prop_map(|(label, t)| HashTree::labeled(label.as_str(), t)),
            ]
        })
        .prop_map(|tree| number_labels(tree, &mut 0))
}

/// Replaces every subtree for which `keep` returns false by its pruned
/// digest.
pub(crate) fn prune_where(tree: &HashTree, keep: &dyn Fn(&HashTree) -> bool) -> HashTree {
    if !keep(tree) {
        return HashTree::Pruned(tree.digest());
    }
    match tree {
        HashTree::Fork(lr) => HashTree::fork(prune_where(&lr.0, keep), prune_where(&lr.1, keep)),
        HashTree::Labeled(label, subtree) => {
            HashTree::Labeled(label.clone(), Box::new(prune_where(subtree, keep)))
        }
        other => other.clone(),
    }
}
