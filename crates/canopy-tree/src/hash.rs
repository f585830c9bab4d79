//! Short, human-memorable node hashes.
//!
//! A hash is `<token>-<tree id>`: a few random `[a-z0-9]` characters drawn
//! from the tree's own deterministic stream, scoped by the owning tree's id.
//! Collisions against the registry are retried a bounded number of times.

use canopy_core::rng::derive_seed;
use canopy_core::{DeterministicRng, NodeHash, SplitMix64, TreeId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const HASH_STREAM: u64 = 0x4841_5348;

pub const DEFAULT_TOKEN_LEN: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HashConfig {
    /// Random characters per token (at least 1).
    pub token_len: usize,
    /// Collision retries before minting gives up.
    pub max_attempts: u32,
    /// Seed mixed with the tree id for the token stream.
    pub seed: u64,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            token_len: DEFAULT_TOKEN_LEN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HashMinter {
    rng: SplitMix64,
    config: HashConfig,
    scope: TreeId,
}

impl HashMinter {
    pub(crate) fn new(scope: TreeId, config: HashConfig) -> Self {
        Self {
            rng: SplitMix64::new(derive_seed(config.seed, scope.0, HASH_STREAM)),
            config,
            scope,
        }
    }

    pub(crate) fn config(&self) -> HashConfig {
        self.config
    }

    fn token(&mut self) -> String {
        let len = self.config.token_len.max(1);
        (0..len)
            .map(|_| ALPHABET[self.rng.next_below(ALPHABET.len() as u64) as usize] as char)
            .collect()
    }

    /// Mint a hash for which `taken` is false.
    ///
    /// # Panics
    ///
    /// When `max_attempts` consecutive candidates are all taken. With the
    /// default token space this means the configuration is broken (for
    /// example a one-character token on a tree with dozens of nodes).
    pub(crate) fn mint(&mut self, taken: impl Fn(&NodeHash) -> bool) -> NodeHash {
        for _ in 0..self.config.max_attempts.max(1) {
            let candidate = NodeHash::new(format!("{}-{}", self.token(), self.scope));
            if !taken(&candidate) {
                return candidate;
            }
        }
        panic!(
            "hash generation exhausted {} attempts for tree {} (token_len={})",
            self.config.max_attempts, self.scope, self.config.token_len
        );
    }
}
