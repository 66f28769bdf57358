use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("secret key bytes do not represent a valid scalar")]
    InvalidSecretKey,
    #[error("public key bytes do not represent a valid point")]
    InvalidPublicKey,
    #[error("signature bytes do not represent a valid point")]
    InvalidSignature,
}
