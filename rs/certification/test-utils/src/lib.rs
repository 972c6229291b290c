//! Deterministic BLS keys and signed certificates for tests.

use candid::Principal;
use ic_bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use ic_bls12_381::{G1Affine, G1Projective, G2Affine, Scalar};
use ic_certification::{
    public_key_to_der, Certificate, CertificateDelegation, PrincipalRange, BLS_SIGNATURE_DST,
};
use ic_crypto_tree_hash::{HashTree, Label};
use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaChaRng;
use serde::Serialize;
use std::collections::BTreeMap;

/// A BLS12-381 key pair derived from a seed.
#[derive(Clone)]
pub struct BlsKeyPair {
    secret_key: Scalar,
    public_key: [u8; 96],
}

impl BlsKeyPair {
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        let secret_key = Scalar::from_bytes_wide(&wide);
        let public_key = G2Affine::from(G2Affine::generator() * secret_key).to_compressed();
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> [u8; 96] {
        self.public_key
    }

    pub fn public_key_der(&self) -> Vec<u8> {
        public_key_to_der(&self.public_key)
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let point = <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(
            msg,
            BLS_SIGNATURE_DST,
        );
        G1Affine::from(point * self.secret_key)
            .to_compressed()
            .to_vec()
    }
}

/// Builds a well-formed hash tree holding `value` at each path.
///
/// Labels are sorted and siblings are combined into a balanced fork
/// structure. Panics if a path is a prefix of another path.
pub fn tree_from_paths<P, V>(entries: impl IntoIterator<Item = (P, V)>) -> HashTree
where
    P: IntoIterator,
    P::Item: Into<Label>,
    V: Into<Vec<u8>>,
{
    let entries: Vec<(Vec<Label>, Vec<u8>)> = entries
        .into_iter()
        .map(|(path, value)| (path.into_iter().map(Into::into).collect(), value.into()))
        .collect();
    build_subtree(entries)
}

fn build_subtree(entries: Vec<(Vec<Label>, Vec<u8>)>) -> HashTree {
    if let [(path, value)] = entries.as_slice() {
        if path.is_empty() {
            return HashTree::Leaf(value.clone());
        }
    }
    let mut children: BTreeMap<Label, Vec<(Vec<Label>, Vec<u8>)>> = BTreeMap::new();
    for (mut path, value) in entries {
        assert!(!path.is_empty(), "a path is a prefix of another path");
        let first = path.remove(0);
        children.entry(first).or_default().push((path, value));
    }
    let labeled: Vec<HashTree> = children
        .into_iter()
        .map(|(label, entries)| HashTree::Labeled(label, Box::new(build_subtree(entries))))
        .collect();
    forks(labeled)
}

fn forks(mut trees: Vec<HashTree>) -> HashTree {
    match trees.len() {
        0 => HashTree::Empty,
        1 => trees.remove(0),
        n => {
            let right = trees.split_off(n / 2);
            HashTree::fork(forks(trees), forks(right))
        }
    }
}

/// Replaces the subtree at `path` by its pruned digest.
pub fn prune_path<L: AsRef<[u8]>>(tree: &HashTree, path: &[L]) -> HashTree {
    match (path.split_first(), tree) {
        (None, t) => HashTree::Pruned(t.digest()),
        (Some(_), HashTree::Fork(lr)) => {
            HashTree::fork(prune_path(&lr.0, path), prune_path(&lr.1, path))
        }
        (Some((first, rest)), HashTree::Labeled(label, subtree))
            if label.as_bytes() == first.as_ref() =>
        {
            HashTree::Labeled(label.clone(), Box::new(prune_path(subtree, rest)))
        }
        (Some(_), t) => t.clone(),
    }
}

/// Encodes a value as CBOR with the self-describe tag, as replicas do.
pub fn to_self_describing_cbor<T: Serialize>(value: &T) -> Vec<u8> {
    let mut serialized = Vec::new();
    let mut serializer = serde_cbor::Serializer::new(&mut serialized);
    serializer.self_describe().expect("failed to write CBOR tag");
    value
        .serialize(&mut serializer)
        .expect("failed to serialize to CBOR");
    serialized
}

/// Encodes nanoseconds since the epoch as the `time` leaf of a state tree.
pub fn encode_time(nanos: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::unsigned(&mut buf, nanos).expect("writing to a Vec cannot fail");
    buf
}

struct DelegationData {
    subnet_id: Principal,
    ranges: Vec<PrincipalRange>,
    subnet_key: BlsKeyPair,
}

/// Builds certificates over a given tree, signed either by the root key or
/// by a delegated subnet.
pub struct CertificateBuilder {
    tree: HashTree,
    root_key: BlsKeyPair,
    delegation: Option<DelegationData>,
}

/// A certificate together with the material needed to verify it.
pub struct CertificateFixture {
    pub certificate: Certificate,
    pub cbor: Vec<u8>,
    pub root_key_der: Vec<u8>,
}

pub const ROOT_KEY_SEED: u64 = 1;
pub const SUBNET_KEY_SEED: u64 = 2;

impl CertificateBuilder {
    pub fn new(tree: HashTree) -> Self {
        Self {
            tree,
            root_key: BlsKeyPair::from_seed(ROOT_KEY_SEED),
            delegation: None,
        }
    }

    pub fn with_root_key(mut self, root_key: BlsKeyPair) -> Self {
        self.root_key = root_key;
        self
    }

    /// Signs the certificate with a subnet key that the root key delegates
    /// to for the given canister ranges.
    pub fn with_delegation(mut self, subnet_id: Principal, ranges: Vec<PrincipalRange>) -> Self {
        self.delegation = Some(DelegationData {
            subnet_id,
            ranges,
            subnet_key: BlsKeyPair::from_seed(SUBNET_KEY_SEED),
        });
        self
    }

    pub fn build(&self) -> CertificateFixture {
        let (signing_key, delegation) = match &self.delegation {
            None => (&self.root_key, None),
            Some(data) => {
                let delegation_tree = tree_from_paths([
                    (
                        vec![
                            Label::from("subnet"),
                            Label::from(data.subnet_id.as_slice()),
                            Label::from("canister_ranges"),
                        ],
                        serde_cbor::to_vec(&data.ranges).expect("failed to encode ranges"),
                    ),
                    (
                        vec![
                            Label::from("subnet"),
                            Label::from(data.subnet_id.as_slice()),
                            Label::from("public_key"),
                        ],
                        data.subnet_key.public_key_der(),
                    ),
                ]);
                let delegation_certificate = sign(delegation_tree, &self.root_key, None);
                (
                    &data.subnet_key,
                    Some(CertificateDelegation {
                        subnet_id: data.subnet_id,
                        certificate: to_self_describing_cbor(&delegation_certificate),
                    }),
                )
            }
        };
        let certificate = sign(self.tree.clone(), signing_key, delegation);
        CertificateFixture {
            cbor: to_self_describing_cbor(&certificate),
            certificate,
            root_key_der: self.root_key.public_key_der(),
        }
    }
}

fn sign(
    tree: HashTree,
    key: &BlsKeyPair,
    delegation: Option<CertificateDelegation>,
) -> Certificate {
    let mut certificate = Certificate {
        tree,
        signature: vec![],
        delegation,
    };
    certificate.signature = key.sign(&certificate.signed_message());
    certificate
}
