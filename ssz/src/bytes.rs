use core::{fmt, marker::PhantomData, ops::Deref};

use primitive_types::H256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use typenum::Unsigned;

use crate::{
    hex_string,
    merkle::{chunk_count, merkleize_bytes, mix_in_length},
    Error, SszHash, BYTES_PER_CHUNK,
};

/// A variable-length byte string with a maximum length of `N` bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteList<N> {
    bytes: Vec<u8>,
    phantom: PhantomData<N>,
}

impl<N: Unsigned> ByteList<N> {
    pub fn try_from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let bytes = bytes.into();

        if bytes.len() > N::USIZE {
            return Err(Error::TooManyBytes {
                actual: bytes.len(),
                maximum: N::USIZE,
            });
        }

        Ok(Self {
            bytes,
            phantom: PhantomData,
        })
    }
}

impl<N> Deref for ByteList<N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<N: Unsigned> SszHash for ByteList<N> {
    fn hash_tree_root(&self) -> H256 {
        let limit = chunk_count(N::USIZE, BYTES_PER_CHUNK);
        mix_in_length(merkleize_bytes(&self.bytes, limit), self.bytes.len())
    }
}

impl<N> fmt::Debug for ByteList<N> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "ByteList(0x{})", hex::encode(&self.bytes))
    }
}

impl<N> Serialize for ByteList<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_string::serialize(&self.bytes, serializer)
    }
}

impl<'de, N: Unsigned> Deserialize<'de> for ByteList<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = hex_string::deserialize(deserializer)?;
        Self::try_from_bytes(bytes).map_err(D::Error::custom)
    }
}

/// A fixed-length byte vector of exactly `N` bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteVector<N> {
    bytes: Vec<u8>,
    phantom: PhantomData<N>,
}

impl<N: Unsigned> Default for ByteVector<N> {
    fn default() -> Self {
        Self {
            bytes: vec![0; N::USIZE],
            phantom: PhantomData,
        }
    }
}

impl<N> Deref for ByteVector<N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<N: Unsigned> SszHash for ByteVector<N> {
    fn hash_tree_root(&self) -> H256 {
        let limit = chunk_count(N::USIZE, BYTES_PER_CHUNK);
        merkleize_bytes(&self.bytes, limit)
    }
}

impl<N> fmt::Debug for ByteVector<N> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "ByteVector(0x{})", hex::encode(&self.bytes))
    }
}

impl<N> Serialize for ByteVector<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_string::serialize(&self.bytes, serializer)
    }
}

impl<'de, N: Unsigned> Deserialize<'de> for ByteVector<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = hex_string::deserialize(deserializer)?;

        if bytes.len() != N::USIZE {
            return Err(D::Error::custom(Error::WrongEncodingLength {
                actual: bytes.len(),
                expected: N::USIZE,
            }));
        }

        Ok(Self {
            bytes,
            phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use typenum::{U32, U4};

    use super::*;

    #[test]
    fn byte_list_enforces_the_maximum() {
        assert!(ByteList::<U4>::try_from_bytes(vec![1, 2, 3, 4]).is_ok());
        assert!(ByteList::<U4>::try_from_bytes(vec![1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn byte_list_roots_differ_by_length() {
        let short = ByteList::<U32>::try_from_bytes(vec![0]).expect("one byte fits");
        let long = ByteList::<U32>::try_from_bytes(vec![0, 0]).expect("two bytes fit");

        assert_ne!(short.hash_tree_root(), long.hash_tree_root());
    }

    #[test]
    fn byte_vector_round_trips_through_hex() {
        let vector = ByteVector::<U4>::default();
        let json = serde_json::to_string(&vector).expect("byte vector should serialize");

        assert_eq!(json, "\"0x00000000\"");

        let decoded: ByteVector<U4> =
            serde_json::from_str(&json).expect("byte vector should deserialize");

        assert_eq!(decoded, vector);
    }
}
