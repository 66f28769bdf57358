use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;
use hex::FromHex;
use impl_serde::impl_fixed_hash_serde;
use ssz::{merkleize_bytes, SszHash, H256};

pub const COMPRESSED_SIZE: usize = 48;

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct PublicKeyBytes(COMPRESSED_SIZE);
}

impl_fixed_hash_serde!(PublicKeyBytes, COMPRESSED_SIZE);

impl FromHex for PublicKeyBytes {
    type Error = <[u8; COMPRESSED_SIZE] as FromHex>::Error;

    fn from_hex<T: AsRef<[u8]>>(digits: T) -> Result<Self, Self::Error> {
        FromHex::from_hex(digits).map(Self)
    }
}

impl SszHash for PublicKeyBytes {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        merkleize_bytes(self.as_bytes(), 2)
    }
}
