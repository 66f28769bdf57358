use core::{fmt, marker::PhantomData, ops::Deref};

use primitive_types::H256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use typenum::Unsigned;

use crate::{
    merkle::{merkleize_chunks, mix_in_length},
    Error, SszHash,
};

/// A variable-length list of composite elements with a maximum length of `N`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContiguousList<T, N> {
    elements: Vec<T>,
    phantom: PhantomData<N>,
}

impl<T, N> Default for ContiguousList<T, N> {
    fn default() -> Self {
        Self {
            elements: vec![],
            phantom: PhantomData,
        }
    }
}

impl<T, N: Unsigned> ContiguousList<T, N> {
    pub fn try_from_iter(elements: impl IntoIterator<Item = T>) -> Result<Self, Error> {
        let elements = elements.into_iter().collect::<Vec<_>>();

        if elements.len() > N::USIZE {
            return Err(Error::TooManyElements {
                actual: elements.len(),
                maximum: N::USIZE,
            });
        }

        Ok(Self {
            elements,
            phantom: PhantomData,
        })
    }

    pub fn push(&mut self, element: T) -> Result<(), Error> {
        if self.elements.len() == N::USIZE {
            return Err(Error::TooManyElements {
                actual: N::USIZE + 1,
                maximum: N::USIZE,
            });
        }

        self.elements.push(element);
        Ok(())
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.elements
    }
}

impl<T, N> Deref for ContiguousList<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.elements
    }
}

impl<'list, T, N> IntoIterator for &'list ContiguousList<T, N> {
    type Item = &'list T;
    type IntoIter = core::slice::Iter<'list, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T, N> IntoIterator for ContiguousList<T, N> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<T: SszHash, N: Unsigned> SszHash for ContiguousList<T, N> {
    fn hash_tree_root(&self) -> H256 {
        let roots = self
            .elements
            .iter()
            .map(SszHash::hash_tree_root)
            .collect::<Vec<_>>();

        mix_in_length(merkleize_chunks(&roots, N::U64), self.elements.len())
    }
}

impl<T: fmt::Debug, N> fmt::Debug for ContiguousList<T, N> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.elements.fmt(formatter)
    }
}

impl<T: Serialize, N> Serialize for ContiguousList<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.elements.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>, N: Unsigned> Deserialize<'de> for ContiguousList<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<T>::deserialize(deserializer)?;
        Self::try_from_iter(elements).map_err(D::Error::custom)
    }
}
