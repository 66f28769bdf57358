use core::fmt;

use ssz::H256;

use crate::{
    error::Error, public_key::PublicKey, signature_bytes::SignatureBytes, DOMAIN_SEPARATION_TAG,
};

#[derive(Clone)]
pub struct Signature(blst::min_pk::Signature);

impl Default for Signature {
    /// The point at infinity. This is the identity for aggregation and the
    /// value carried by empty sync aggregates.
    fn default() -> Self {
        SignatureBytes::empty()
            .try_into()
            .expect("the compressed point at infinity is a valid signature encoding")
    }
}

impl Signature {
    pub(crate) const fn from_raw(raw: blst::min_pk::Signature) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn to_bytes(&self) -> SignatureBytes {
        SignatureBytes(self.0.compress())
    }

    #[must_use]
    pub fn verify(&self, message: H256, public_key: &PublicKey) -> bool {
        self.0.verify(
            true,
            message.as_bytes(),
            DOMAIN_SEPARATION_TAG,
            &[],
            public_key.as_raw(),
            true,
        ) == blst::BLST_ERROR::BLST_SUCCESS
    }

    pub fn aggregate_in_place(&mut self, other: &Self) {
        // The point at infinity contributes nothing; skipping it keeps
        // aggregation total.
        if *other == Self::default() {
            return;
        }

        if *self == Self::default() {
            self.0 = other.0;
            return;
        }

        let mut aggregate = blst::min_pk::AggregateSignature::from_signature(&self.0);

        aggregate
            .add_signature(&other.0, false)
            .expect("signature was validated on construction");

        self.0 = aggregate.to_signature();
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Signature({:?})", self.to_bytes())
    }
}

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        blst::min_pk::Signature::uncompress(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl From<Signature> for SignatureBytes {
    fn from(signature: Signature) -> Self {
        signature.to_bytes()
    }
}
