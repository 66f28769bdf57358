use primitive_types::{H160, H256, U256};

use crate::BYTES_PER_CHUNK;

/// Hash tree roots for consensus objects. Composite containers implement this
/// by merkleizing their field roots; primitives occupy a single chunk.
pub trait SszHash {
    fn hash_tree_root(&self) -> H256;
}

impl SszHash for H256 {
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl SszHash for H160 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = [0_u8; BYTES_PER_CHUNK];
        chunk[..20].copy_from_slice(self.as_bytes());
        H256(chunk)
    }
}

impl SszHash for U256 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = [0_u8; BYTES_PER_CHUNK];
        self.to_little_endian(&mut chunk);
        H256(chunk)
    }
}

impl SszHash for u64 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = [0_u8; BYTES_PER_CHUNK];
        chunk[..8].copy_from_slice(&self.to_le_bytes());
        H256(chunk)
    }
}

impl SszHash for u8 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = [0_u8; BYTES_PER_CHUNK];
        chunk[0] = *self;
        H256(chunk)
    }
}

impl SszHash for bool {
    fn hash_tree_root(&self) -> H256 {
        u8::from(*self).hash_tree_root()
    }
}

impl<T: SszHash> SszHash for &T {
    fn hash_tree_root(&self) -> H256 {
        (*self).hash_tree_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_occupies_the_low_bytes_of_a_chunk() {
        let root = 0x0102_0304_u64.hash_tree_root();

        assert_eq!(root[0], 4);
        assert_eq!(root[1], 3);
        assert_eq!(root[2], 2);
        assert_eq!(root[3], 1);
        assert_eq!(&root[4..], [0; 28]);
    }

    #[test]
    fn h256_is_its_own_root() {
        let value = H256::repeat_byte(0xab);
        assert_eq!(value.hash_tree_root(), value);
    }
}
