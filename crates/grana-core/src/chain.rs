//! Transform chains, the identity of a cache request.

use crate::transform::Transform;
use std::fmt;

const HASH_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const HASH_PRIME: u64 = 0x0000_0100_0000_01b3;
const INDEX_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Ordered list of transforms plus a no-cache index.
///
/// Transforms at or after `no_cache_index` are never persisted as
/// intermediate results. `partial_hash(k)` depends only on the first `k`
/// transforms, so chains sharing a prefix share its cache address.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    transforms: Vec<Transform>,
    no_cache_index: usize,
}

impl Chain {
    /// Chain with every intermediate result cacheable.
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self {
            transforms,
            no_cache_index: usize::MAX,
        }
    }

    pub fn with_no_cache_index(mut self, index: usize) -> Self {
        self.no_cache_index = index;
        self
    }

    pub fn set_no_cache_index(&mut self, index: usize) {
        self.no_cache_index = index;
    }

    pub fn no_cache_index(&self) -> usize {
        self.no_cache_index
    }

    pub fn push(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }

    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// True if the result of transform `index` may be persisted.
    pub fn is_cacheable(&self, index: usize) -> bool {
        index < self.no_cache_index
    }

    /// Hash of the whole chain.
    pub fn hash(&self) -> u64 {
        self.partial_hash(self.transforms.len())
    }

    /// Hash of the first `n` transforms (clamped to the chain length).
    ///
    /// Each step rotates the accumulator and mixes in the transform hash
    /// salted by its position, so reordering changes the result.
    pub fn partial_hash(&self, n: usize) -> u64 {
        self.transforms
            .iter()
            .take(n)
            .enumerate()
            .fold(HASH_SEED, |acc, (i, t)| {
                let salted = t.stable_hash() ^ (i as u64 + 1).wrapping_mul(INDEX_SALT);
                (acc.rotate_left(17) ^ salted).wrapping_mul(HASH_PRIME)
            })
    }

    /// Transform descriptions joined with ` -> `.
    pub fn describe(&self) -> String {
        self.transforms
            .iter()
            .map(|t| t.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl From<Vec<Transform>> for Chain {
    fn from(transforms: Vec<Transform>) -> Self {
        Self::new(transforms)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
