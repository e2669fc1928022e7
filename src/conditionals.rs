// Copyright 2025 - See NOTICE file for copyright holders.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Commitment to a dictionary of conditional payments and its proofs.
//!
//! The dictionary maps a `u32` index to an opaque condition. Its commitment
//! is the root of a binary Merkle tree over the entries with
//!
//! ```text
//! leaf = sha256(0x00 || index (4 bytes, big endian) || condition)
//! node = sha256(0x01 || min(left, right) || max(left, right))
//! ```
//!
//! The root of the empty dictionary is 32 zero bytes, which no proof opens.
//! Conditions are never interpreted here; an evaluator contract turns a
//! condition and a caller-supplied input into an amount.

use crate::sol::ConditionalProof;
use crate::Error;
use soroban_sdk::{contractclient, Bytes, BytesN, Env, Map};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Interface of the contract that evaluates conditions.
#[allow(dead_code)]
#[contractclient(name = "ConditionalEvaluatorClient")]
pub trait ConditionalEvaluator {
    /// Returns the amount the condition releases for the given input.
    fn evaluate(env: Env, condition: Bytes, input: u128) -> i128;
}

pub fn empty_root(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[0u8; 32])
}

pub fn leaf_hash(env: &Env, index: u32, condition: &Bytes) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.push_back(LEAF_PREFIX);
    data.extend_from_array(&index.to_be_bytes());
    data.append(condition);
    env.crypto().sha256(&data)
}

pub fn node_hash(env: &Env, left: &BytesN<32>, right: &BytesN<32>) -> BytesN<32> {
    let (l, r) = (left.to_array(), right.to_array());
    let (lo, hi) = if l <= r { (l, r) } else { (r, l) };
    let mut data = Bytes::new(env);
    data.push_back(NODE_PREFIX);
    data.extend_from_array(&lo);
    data.extend_from_array(&hi);
    env.crypto().sha256(&data)
}

// compute_root folds the proof path over the leaf of a single entry.
pub fn compute_root(env: &Env, entry: &ConditionalProof) -> BytesN<32> {
    let mut acc = leaf_hash(env, entry.index, &entry.condition);
    for sibling in entry.path.iter() {
        acc = node_hash(env, &acc, &sibling);
    }
    acc
}

/// Opens every proof entry against root and returns the proven conditions
/// by index. A single entry that does not lead to root rejects the whole
/// proof, as does a second, different condition for the same index.
pub fn verify_proof(
    env: &Env,
    root: &BytesN<32>,
    proof: &[ConditionalProof],
) -> Result<Map<u32, Bytes>, Error> {
    let mut proven = Map::new(env);
    for entry in proof {
        if compute_root(env, entry) != *root {
            return Err(Error::IncorrectConditionalsProof);
        }
        match proven.get(entry.index) {
            Some(existing) if existing != entry.condition => {
                return Err(Error::IncorrectConditionalsProof)
            }
            _ => proven.set(entry.index, entry.condition.clone()),
        }
    }
    Ok(proven)
}

#[cfg(any(test, feature = "testutils"))]
pub use tree::ConditionalsTree;

#[cfg(any(test, feature = "testutils"))]
mod tree {
    use super::{empty_root, leaf_hash, node_hash};
    use crate::sol::ConditionalProof;
    use alloc::vec::Vec;
    use soroban_sdk::{Bytes, BytesN, Env};

    /// Off-chain builder for a conditionals dictionary.
    pub struct ConditionalsTree {
        entries: Vec<(u32, Bytes)>,
        levels: Vec<Vec<BytesN<32>>>,
    }

    impl ConditionalsTree {
        pub fn new(env: &Env, entries: &[(u32, Bytes)]) -> Self {
            let mut levels = Vec::new();
            let mut level: Vec<BytesN<32>> = entries
                .iter()
                .map(|(index, condition)| leaf_hash(env, *index, condition))
                .collect();
            while level.len() > 1 {
                let next = level
                    .chunks(2)
                    .map(|pair| match pair {
                        [l, r] => node_hash(env, l, r),
                        [single] => single.clone(),
                        _ => unreachable!(),
                    })
                    .collect();
                levels.push(level);
                level = next;
            }
            levels.push(level);
            ConditionalsTree {
                entries: entries.to_vec(),
                levels,
            }
        }

        pub fn root(&self, env: &Env) -> BytesN<32> {
            match self.levels.last().and_then(|top| top.first()) {
                Some(root) => root.clone(),
                None => empty_root(env),
            }
        }

        /// Proof for the entry at position pos in the builder's input.
        pub fn proof(&self, env: &Env, pos: usize) -> ConditionalProof {
            let (index, condition) = self.entries[pos].clone();
            let mut path = soroban_sdk::Vec::new(env);
            let mut i = pos;
            for level in &self.levels[..self.levels.len() - 1] {
                let sibling = i ^ 1;
                if sibling < level.len() {
                    path.push_back(level[sibling].clone());
                }
                i /= 2;
            }
            ConditionalProof {
                index,
                condition,
                path,
            }
        }
    }
}
