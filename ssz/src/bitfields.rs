use core::{fmt, marker::PhantomData};

use primitive_types::H256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use typenum::Unsigned;

use crate::{
    hex_string,
    merkle::{chunk_count, merkleize_bytes, mix_in_length},
    Error, SszHash, BYTES_PER_CHUNK,
};

const BITS_PER_CHUNK: usize = BYTES_PER_CHUNK * 8;

/// A variable-length bit list with a maximum length of `N` bits. The hex form
/// carries the SSZ delimiter bit; the in-memory form does not.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BitList<N> {
    bytes: Vec<u8>,
    length: usize,
    phantom: PhantomData<N>,
}

impl<N: Unsigned> BitList<N> {
    /// A list of `length` zero bits.
    #[must_use]
    pub fn with_length(length: usize) -> Self {
        assert!(
            length <= N::USIZE,
            "bit list length exceeds the type-level maximum",
        );

        Self {
            bytes: vec![0; length.div_ceil(8)],
            length,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.length, "bit index out of bounds");

        if value {
            self.bytes[index / 8] |= 1 << (index % 8);
        } else {
            self.bytes[index / 8] &= !(1 << (index % 8));
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.length).then(|| self.bytes[index / 8] & (1 << (index % 8)) != 0)
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.iter().filter(|bit| *bit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.length).map(|index| self.bytes[index / 8] & (1 << (index % 8)) != 0)
    }

    fn to_delimited_bytes(&self) -> Vec<u8> {
        let mut bytes = self.bytes.clone();

        if self.length % 8 == 0 {
            bytes.push(1);
        } else {
            bytes[self.length / 8] |= 1 << (self.length % 8);
        }

        bytes
    }

    fn from_delimited_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let last = bytes.last().copied().filter(|byte| *byte != 0);
        let Some(last) = last else {
            return Err(Error::MissingDelimiterBit);
        };

        let delimiter_position = 7 - last.leading_zeros() as usize;
        let length = (bytes.len() - 1) * 8 + delimiter_position;

        if length > N::USIZE {
            return Err(Error::TooManyElements {
                actual: length,
                maximum: N::USIZE,
            });
        }

        let mut list = Self::with_length(length);

        for index in 0..length {
            if bytes[index / 8] & (1 << (index % 8)) != 0 {
                list.set(index, true);
            }
        }

        Ok(list)
    }
}

impl<N: Unsigned> SszHash for BitList<N> {
    fn hash_tree_root(&self) -> H256 {
        let limit = chunk_count(N::USIZE, BITS_PER_CHUNK);
        mix_in_length(merkleize_bytes(&self.bytes, limit), self.length)
    }
}

impl<N> fmt::Debug for BitList<N> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "BitList(0x{})", hex::encode(&self.bytes))
    }
}

impl<N: Unsigned> Serialize for BitList<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_string::serialize(&self.to_delimited_bytes(), serializer)
    }
}

impl<'de, N: Unsigned> Deserialize<'de> for BitList<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = hex_string::deserialize(deserializer)?;
        Self::from_delimited_bytes(&bytes).map_err(D::Error::custom)
    }
}

/// A fixed-length bit vector of exactly `N` bits.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitVector<N> {
    bytes: Vec<u8>,
    phantom: PhantomData<N>,
}

impl<N: Unsigned> Default for BitVector<N> {
    fn default() -> Self {
        Self {
            bytes: vec![0; N::USIZE.div_ceil(8)],
            phantom: PhantomData,
        }
    }
}

impl<N: Unsigned> BitVector<N> {
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < N::USIZE, "bit index out of bounds");

        if value {
            self.bytes[index / 8] |= 1 << (index % 8);
        } else {
            self.bytes[index / 8] &= !(1 << (index % 8));
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < N::USIZE, "bit index out of bounds");
        self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.iter().filter(|bit| *bit).count()
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.bytes.iter().any(|byte| *byte != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..N::USIZE).map(|index| self.bytes[index / 8] & (1 << (index % 8)) != 0)
    }
}

impl<N: Unsigned> IntoIterator for &BitVector<N> {
    type Item = bool;
    type IntoIter = std::vec::IntoIter<bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter().collect::<Vec<_>>().into_iter()
    }
}

impl<N: Unsigned> SszHash for BitVector<N> {
    fn hash_tree_root(&self) -> H256 {
        let limit = chunk_count(N::USIZE, BITS_PER_CHUNK);
        merkleize_bytes(&self.bytes, limit)
    }
}

impl<N> fmt::Debug for BitVector<N> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "BitVector(0x{})", hex::encode(&self.bytes))
    }
}

impl<N: Unsigned> Serialize for BitVector<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_string::serialize(&self.bytes, serializer)
    }
}

impl<'de, N: Unsigned> Deserialize<'de> for BitVector<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = hex_string::deserialize(deserializer)?;
        let expected = N::USIZE.div_ceil(8);

        if bytes.len() != expected {
            return Err(D::Error::custom(Error::WrongEncodingLength {
                actual: bytes.len(),
                expected,
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
    use typenum::{U4, U64};

    use super::*;

    #[test]
    fn bit_list_set_and_get() {
        let mut bits = BitList::<U64>::with_length(5);

        assert_eq!(bits.get(2), Some(false));

        bits.set(2, true);

        assert_eq!(bits.get(2), Some(true));
        assert_eq!(bits.get(5), None);
        assert_eq!(bits.count_ones(), 1);
    }

    #[test]
    fn bit_list_hex_round_trip_preserves_length() {
        let mut bits = BitList::<U64>::with_length(8);
        bits.set(0, true);
        bits.set(7, true);

        let json = serde_json::to_string(&bits).expect("bit list should serialize");
        let decoded: BitList<U64> =
            serde_json::from_str(&json).expect("bit list should deserialize");

        assert_eq!(decoded, bits);
        assert_eq!(decoded.len(), 8);
    }

    #[test]
    fn bit_list_roots_differ_by_length() {
        let short = BitList::<U64>::with_length(3);
        let long = BitList::<U64>::with_length(4);

        assert_ne!(short.hash_tree_root(), long.hash_tree_root());
    }

    #[test]
    fn bit_vector_serializes_without_delimiter() {
        let mut bits = BitVector::<U4>::default();
        bits.set(1, true);

        let json = serde_json::to_string(&bits).expect("bit vector should serialize");

        assert_eq!(json, "\"0x02\"");
    }

    #[test]
    fn bit_vector_round_trips() {
        let mut bits = BitVector::<U4>::default();
        bits.set(3, true);

        let json = serde_json::to_string(&bits).expect("bit vector should serialize");
        let decoded: BitVector<U4> =
            serde_json::from_str(&json).expect("bit vector should deserialize");

        assert_eq!(decoded, bits);
    }
}
