use core::fmt;

use ssz::H256;

use crate::{
    error::Error, public_key::PublicKey, secret_key_bytes::SecretKeyBytes, signature::Signature,
    DOMAIN_SEPARATION_TAG,
};

pub struct SecretKey(blst::min_pk::SecretKey);

impl SecretKey {
    /// Derives a secret key from input key material as in the EIP-2333 key
    /// generation entry point. The material must be at least 32 bytes.
    pub fn key_gen(input_key_material: &[u8]) -> Result<Self, Error> {
        blst::min_pk::SecretKey::key_gen(input_key_material, &[])
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }

    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_raw(self.0.sk_to_pk())
    }

    #[must_use]
    pub fn sign(&self, message: H256) -> Signature {
        Signature::from_raw(self.0.sign(
            message.as_bytes(),
            DOMAIN_SEPARATION_TAG,
            &[],
        ))
    }

    #[must_use]
    pub fn to_bytes(&self) -> SecretKeyBytes {
        SecretKeyBytes(self.0.to_bytes())
    }
}

impl TryFrom<SecretKeyBytes> for SecretKey {
    type Error = Error;

    fn try_from(bytes: SecretKeyBytes) -> Result<Self, Self::Error> {
        blst::min_pk::SecretKey::from_bytes(bytes.as_ref())
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("[REDACTED]")
    }
}
