use primitive_types::H256;
use sha2::{Digest as _, Sha256};

pub const ZERO_HASHES_MAX_DEPTH: usize = 48;

#[must_use]
pub fn hash(bytes: impl AsRef<[u8]>) -> H256 {
    H256(Sha256::digest(bytes).into())
}

#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    H256(hasher.finalize().into())
}

/// Hash of a 48-byte input (compressed BLS public key).
#[must_use]
pub fn hash_384(bytes: impl AsRef<[u8; 48]>) -> H256 {
    hash(bytes.as_ref())
}

/// Hash of a 96-byte input (compressed BLS signature).
#[must_use]
pub fn hash_768(bytes: impl AsRef<[u8; 96]>) -> H256 {
    hash(bytes.as_ref())
}

/// `hash_256_256` applied to pairs of zero hashes, indexed by depth.
#[must_use]
pub fn zero_hash(depth: usize) -> H256 {
    zero_hashes()[depth]
}

fn zero_hashes() -> &'static [H256; ZERO_HASHES_MAX_DEPTH] {
    use std::sync::OnceLock;

    static ZERO_HASHES: OnceLock<[H256; ZERO_HASHES_MAX_DEPTH]> = OnceLock::new();

    ZERO_HASHES.get_or_init(|| {
        let mut hashes = [H256::zero(); ZERO_HASHES_MAX_DEPTH];

        for depth in 1..ZERO_HASHES_MAX_DEPTH {
            hashes[depth] = hash_256_256(hashes[depth - 1], hashes[depth - 1]);
        }

        hashes
    })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn hash_of_empty_input_matches_sha256() {
        assert_eq!(
            hash([]),
            H256(hex!(
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            )),
        );
    }

    #[test]
    fn hash_256_256_concatenates_before_hashing() {
        let left = H256::repeat_byte(1);
        let right = H256::repeat_byte(2);

        let mut concatenated = [0_u8; 64];
        concatenated[..32].copy_from_slice(left.as_bytes());
        concatenated[32..].copy_from_slice(right.as_bytes());

        assert_eq!(hash_256_256(left, right), hash(concatenated));
    }

    #[test]
    fn zero_hashes_are_chained() {
        assert_eq!(zero_hash(0), H256::zero());
        assert_eq!(zero_hash(1), hash_256_256(H256::zero(), H256::zero()));
        assert_eq!(zero_hash(2), hash_256_256(zero_hash(1), zero_hash(1)));
    }
}
