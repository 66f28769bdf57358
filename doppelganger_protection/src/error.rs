use bls::PublicKeyBytes;
use thiserror::Error;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error(
        "doppelgangers detected for validators: {public_keys:?}; \
         another node is signing with the same keys"
    )]
    DoppelgangersDetected { public_keys: Vec<PublicKeyBytes> },
}
