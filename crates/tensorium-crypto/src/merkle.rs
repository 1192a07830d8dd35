use crate::{keccak256_concat, Hash};

/// Binary Merkle tree over a list of leaf hashes.
///
/// Odd levels duplicate their last node. The empty tree has an all-zero
/// root. Leaf order is significant: callers on consensus paths must supply
/// leaves in a deterministic (key-sorted) order.
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree from leaf hashes
    pub fn new(leaves: Vec<Hash>) -> Self {
        let mut levels = vec![leaves];

        while levels.last().map(|l| l.len()).unwrap_or(0) > 1 {
            let current = levels.last().expect("at least one level");
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for chunk in current.chunks(2) {
                let right = chunk.get(1).unwrap_or(&chunk[0]);
                next.push(keccak256_concat(&chunk[0], right));
            }
            levels.push(next);
        }

        Self { levels }
    }

    /// Root hash of the tree
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merkle proof (sibling path) for the leaf at `index`
    pub fn proof(&self, index: usize) -> Vec<Hash> {
        let mut proof = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            if level.len() <= 1 {
                break;
            }
            let sibling = if idx % 2 == 0 {
                // Odd level: last node is its own sibling
                level.get(idx + 1).unwrap_or(&level[idx])
            } else {
                &level[idx - 1]
            };
            proof.push(*sibling);
            idx /= 2;
        }
        proof
    }

    /// Verify a Merkle proof produced by [`MerkleTree::proof`]
    pub fn verify_proof(leaf: &Hash, index: usize, proof: &[Hash], root: &Hash) -> bool {
        let mut acc = *leaf;
        let mut idx = index;
        for sibling in proof {
            acc = if idx % 2 == 0 {
                keccak256_concat(&acc, sibling)
            } else {
                keccak256_concat(sibling, &acc)
            };
            idx /= 2;
        }
        &acc == root
    }
}

/// Root over a set of namespaced entries.
///
/// Each entry is hashed as `keccak256(namespace_id || key || value)`; the
/// caller must supply entries sorted by (namespace_id, key) so the root is
/// identical on every node.
pub fn namespaced_root(entries: &[(u8, Vec<u8>, Vec<u8>)]) -> Hash {
    let leaves = entries
        .iter()
        .map(|(ns, key, value)| {
            let mut data = Vec::with_capacity(1 + key.len() + value.len());
            data.push(*ns);
            data.extend_from_slice(key);
            data.extend_from_slice(value);
            crate::keccak256(&data)
        })
        .collect();
    MerkleTree::new(leaves).root()
}
