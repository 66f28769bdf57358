use core::fmt;

use crate::{error::Error, public_key_bytes::PublicKeyBytes};

#[derive(Clone)]
pub struct PublicKey(blst::min_pk::PublicKey);

impl PublicKey {
    pub(crate) const fn from_raw(raw: blst::min_pk::PublicKey) -> Self {
        Self(raw)
    }

    pub(crate) const fn as_raw(&self) -> &blst::min_pk::PublicKey {
        &self.0
    }

    #[must_use]
    pub fn to_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.0.compress())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "PublicKey({:?})", self.to_bytes())
    }
}

impl TryFrom<PublicKeyBytes> for PublicKey {
    type Error = Error;

    fn try_from(bytes: PublicKeyBytes) -> Result<Self, Self::Error> {
        blst::min_pk::PublicKey::uncompress(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey)
    }
}

impl From<PublicKey> for PublicKeyBytes {
    fn from(public_key: PublicKey) -> Self {
        public_key.to_bytes()
    }
}
