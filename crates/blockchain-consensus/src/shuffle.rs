//! Deterministic validator shuffle (§4.9's post-block advance). Every node
//! must derive the same `randomList` from the same seed without any shared
//! external PRNG state, so the stream is a simple counter-mode
//! keccak-256 construction: `keccak256(seed || counter_be_u64)` for
//! `counter = 0, 1, 2, ...`, consumed 8 bytes at a time by a standard
//! Fisher-Yates pass.

use blockchain_crypto::{hash::keccak256, Address, Hash};

struct RandomStream<'a> {
    seed: &'a Hash,
    counter: u64,
    block: [u8; 32],
    offset: usize,
}

impl<'a> RandomStream<'a> {
    fn new(seed: &'a Hash) -> Self {
        let mut stream = Self {
            seed,
            counter: 0,
            block: [0u8; 32],
            offset: 32, // force a refill on first draw
        };
        stream.refill();
        stream
    }

    fn refill(&mut self) {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(self.seed.as_bytes());
        buf.extend_from_slice(&self.counter.to_be_bytes());
        self.block = *keccak256(&buf).as_bytes();
        self.counter += 1;
        self.offset = 0;
    }

    /// Draw a `u64` uniformly-ish from the stream; used only to pick an
    /// index in `0..bound`, so the slight modulo bias is negligible for
    /// the validator-set sizes this runs over.
    fn next_u64(&mut self) -> u64 {
        if self.offset + 8 > self.block.len() {
            self.refill();
        }
        let bytes: [u8; 8] = self.block[self.offset..self.offset + 8].try_into().unwrap();
        self.offset += 8;
        u64::from_be_bytes(bytes)
    }

    fn next_index(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Deterministic Fisher-Yates shuffle of `validators`, keyed by `seed`.
/// Identical `(validators, seed)` always produces the identical ordering
/// on every node.
pub fn shuffle(validators: &[Address], seed: &Hash) -> Vec<Address> {
    let mut list = validators.to_vec();
    if list.len() < 2 {
        return list;
    }
    let mut stream = RandomStream::new(seed);
    for i in (1..list.len()).rev() {
        let j = stream.next_index(i + 1);
        list.swap(i, j);
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validators(n: u8) -> Vec<Address> {
        (0..n).map(|i| Address::from_bytes([i; 20])).collect()
    }

    #[test]
    fn same_seed_and_set_always_shuffles_identically() {
        let set = validators(8);
        let seed = Hash::from_bytes([7u8; 32]);
        assert_eq!(shuffle(&set, &seed), shuffle(&set, &seed));
    }

    #[test]
    fn different_seed_usually_changes_the_order() {
        let set = validators(8);
        let a = shuffle(&set, &Hash::from_bytes([1u8; 32]));
        let b = shuffle(&set, &Hash::from_bytes([2u8; 32]));
        assert_ne!(a, b);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let set = validators(10);
        let seed = Hash::from_bytes([3u8; 32]);
        let mut shuffled = shuffle(&set, &seed);
        shuffled.sort();
        let mut original = set.clone();
        original.sort();
        assert_eq!(shuffled, original);
    }

    #[test]
    fn single_validator_is_unchanged() {
        let set = validators(1);
        let seed = Hash::from_bytes([9u8; 32]);
        assert_eq!(shuffle(&set, &seed), set);
    }
}
