mod types;

pub use types::Hash;

use sha3::{Digest, Keccak256};

/// keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash::from_bytes(hasher.finalize().into())
}

/// keccak-256 of several byte slices concatenated, without an intermediate allocation.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash::from_bytes(hasher.finalize().into())
}

/// Binary Merkle root over leaf hashes, odd nodes duplicated at each level.
/// Returns the zero hash for an empty input, matching the convention that an
/// empty tx list produces the zero merkle root rather than failing.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::zero();
    }
    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            next.push(keccak256_concat(&[left.as_bytes(), right.as_bytes()]));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_is_deterministic() {
        assert_eq!(keccak256(b"hello"), keccak256(b"hello"));
        assert_ne!(keccak256(b"hello"), keccak256(b"hellp"));
    }

    #[test]
    fn merkle_single_leaf_is_itself() {
        let h = keccak256(b"leaf");
        assert_eq!(merkle_root(&[h]), h);
    }

    #[test]
    fn merkle_odd_count_duplicates_last() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        let c = keccak256(b"c");
        let root_odd = merkle_root(&[a, b, c]);
        let root_even = merkle_root(&[a, b, c, c]);
        assert_eq!(root_odd, root_even);
    }

    #[test]
    fn merkle_empty_is_zero() {
        assert_eq!(merkle_root(&[]), Hash::zero());
    }
}
