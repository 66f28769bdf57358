pub use crate::{
    signer::{KeyOrigin, Signer, Snapshot},
    types::{ForkInfo, SigningBlock, SigningMessage, SigningTriple},
    web3signer::{Web3SignerEndpoint, Web3SignerError},
};

mod signer;
mod types;
mod web3signer;
