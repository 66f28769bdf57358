//! Implementation of [EIP-3076](https://eips.ethereum.org/EIPS/eip-3076).

use std::path::Path;

use anyhow::{ensure, Result};
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::phase0::primitives::{Epoch, Slot, H256};

const INTERCHANGE_FORMAT_VERSION: InterchangeFormatVersion = 5;

type InterchangeFormatVersion = usize;

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterchangeFormat {
    pub metadata: InterchangeMeta,
    pub data: Vec<InterchangeData>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterchangeMeta {
    #[serde(with = "serde_utils::string_or_native")]
    pub interchange_format_version: InterchangeFormatVersion,
    pub genesis_validators_root: H256,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterchangeData {
    pub pubkey: PublicKeyBytes,
    pub signed_blocks: Vec<InterchangeBlock>,
    pub signed_attestations: Vec<InterchangeAttestation>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterchangeBlock {
    #[serde(with = "serde_utils::string_or_native")]
    pub slot: Slot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<H256>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterchangeAttestation {
    #[serde(with = "serde_utils::string_or_native")]
    pub source_epoch: Epoch,
    #[serde(with = "serde_utils::string_or_native")]
    pub target_epoch: Epoch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<H256>,
}

impl InterchangeData {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.signed_attestations.is_empty() && self.signed_blocks.is_empty()
    }
}

impl InterchangeFormat {
    #[must_use]
    pub const fn new(genesis_validators_root: H256, data: Vec<InterchangeData>) -> Self {
        Self {
            metadata: InterchangeMeta {
                interchange_format_version: INTERCHANGE_FORMAT_VERSION,
                genesis_validators_root,
            },
            data,
        }
    }

    pub fn load_from_file(file: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs_err::read(file)?;
        let data = serde_json::from_slice(bytes.as_slice())?;
        Ok(data)
    }

    pub fn validate(&self, genesis_validators_root: H256) -> Result<()> {
        let version = self.metadata.interchange_format_version;

        ensure!(
            version == INTERCHANGE_FORMAT_VERSION,
            Error::UnsupportedVersion { version },
        );

        let in_chain = genesis_validators_root;
        let in_metadata = self.metadata.genesis_validators_root;

        ensure!(
            in_chain == in_metadata,
            Error::GenesisValidatorsRootMismatch {
                in_chain,
                in_metadata,
            },
        );

        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(InterchangeData::is_empty)
    }
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
enum Error {
    #[error(
        "unsupported interchange format version \
         (supported: {INTERCHANGE_FORMAT_VERSION}, in metadata: {version})"
    )]
    UnsupportedVersion { version: InterchangeFormatVersion },
    #[error(
        "incorrect genesis validators root \
         (in current chain: {in_chain:?}, in metadata: {in_metadata:?})"
    )]
    GenesisValidatorsRootMismatch { in_chain: H256, in_metadata: H256 },
}
