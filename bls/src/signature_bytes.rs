use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;
use hex::FromHex;
use impl_serde::impl_fixed_hash_serde;
use ssz::{merkleize_bytes, SszHash, H256};

pub const COMPRESSED_SIZE: usize = 96;

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct SignatureBytes(COMPRESSED_SIZE);
}

impl_fixed_hash_serde!(SignatureBytes, COMPRESSED_SIZE);

impl FromHex for SignatureBytes {
    type Error = <[u8; COMPRESSED_SIZE] as FromHex>::Error;

    fn from_hex<T: AsRef<[u8]>>(digits: T) -> Result<Self, Self::Error> {
        FromHex::from_hex(digits).map(Self)
    }
}

impl SignatureBytes {
    /// The compressed form of the point at infinity, used for empty aggregates.
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.0[0] = 0xc0;
        bytes
    }
}

impl SszHash for SignatureBytes {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        merkleize_bytes(self.as_bytes(), 3)
    }
}
