use bls::SignatureBytes;
use serde::Serialize;
use ssz::{SszHash, H256};

use crate::{
    altair::containers::{
        BeaconBlock as AltairBeaconBlock, SignedBeaconBlock as AltairSignedBeaconBlock,
        SyncAggregate,
    },
    bellatrix::containers::{
        BeaconBlock as BellatrixBeaconBlock, SignedBeaconBlock as BellatrixSignedBeaconBlock,
    },
    nonstandard::Phase,
    phase0::{
        containers::{
            BeaconBlock as Phase0BeaconBlock, BeaconBlockHeader,
            SignedBeaconBlock as Phase0SignedBeaconBlock,
        },
        primitives::{Slot, ValidatorIndex},
    },
    preset::Preset,
};

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(bound = "", untagged)]
pub enum BeaconBlock<P: Preset> {
    Phase0(Phase0BeaconBlock<P>),
    Altair(AltairBeaconBlock<P>),
    Bellatrix(BellatrixBeaconBlock<P>),
}

impl<P: Preset> From<Phase0BeaconBlock<P>> for BeaconBlock<P> {
    fn from(block: Phase0BeaconBlock<P>) -> Self {
        Self::Phase0(block)
    }
}

impl<P: Preset> From<AltairBeaconBlock<P>> for BeaconBlock<P> {
    fn from(block: AltairBeaconBlock<P>) -> Self {
        Self::Altair(block)
    }
}

impl<P: Preset> From<BellatrixBeaconBlock<P>> for BeaconBlock<P> {
    fn from(block: BellatrixBeaconBlock<P>) -> Self {
        Self::Bellatrix(block)
    }
}

impl<P: Preset> SszHash for BeaconBlock<P> {
    fn hash_tree_root(&self) -> H256 {
        match self {
            Self::Phase0(block) => block.hash_tree_root(),
            Self::Altair(block) => block.hash_tree_root(),
            Self::Bellatrix(block) => block.hash_tree_root(),
        }
    }
}

impl<P: Preset> BeaconBlock<P> {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Phase0(_) => Phase::Phase0,
            Self::Altair(_) => Phase::Altair,
            Self::Bellatrix(_) => Phase::Bellatrix,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        match self {
            Self::Phase0(block) => block.slot,
            Self::Altair(block) => block.slot,
            Self::Bellatrix(block) => block.slot,
        }
    }

    #[must_use]
    pub const fn proposer_index(&self) -> ValidatorIndex {
        match self {
            Self::Phase0(block) => block.proposer_index,
            Self::Altair(block) => block.proposer_index,
            Self::Bellatrix(block) => block.proposer_index,
        }
    }

    #[must_use]
    pub const fn parent_root(&self) -> H256 {
        match self {
            Self::Phase0(block) => block.parent_root,
            Self::Altair(block) => block.parent_root,
            Self::Bellatrix(block) => block.parent_root,
        }
    }

    #[must_use]
    pub const fn state_root(&self) -> H256 {
        match self {
            Self::Phase0(block) => block.state_root,
            Self::Altair(block) => block.state_root,
            Self::Bellatrix(block) => block.state_root,
        }
    }

    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        match self {
            Self::Phase0(block) => block.to_header(),
            Self::Altair(block) => block.to_header(),
            Self::Bellatrix(block) => block.to_header(),
        }
    }

    #[must_use]
    pub fn sync_aggregate(&self) -> Option<&SyncAggregate<P>> {
        match self {
            Self::Phase0(_) => None,
            Self::Altair(block) => Some(&block.body.sync_aggregate),
            Self::Bellatrix(block) => Some(&block.body.sync_aggregate),
        }
    }

    #[must_use]
    pub fn with_state_root(self, state_root: H256) -> Self {
        match self {
            Self::Phase0(block) => block.with_state_root(state_root).into(),
            Self::Altair(block) => block.with_state_root(state_root).into(),
            Self::Bellatrix(block) => block.with_state_root(state_root).into(),
        }
    }

    #[must_use]
    pub fn with_signature(self, signature: SignatureBytes) -> SignedBeaconBlock<P> {
        match self {
            Self::Phase0(block) => block.with_signature(signature).into(),
            Self::Altair(block) => block.with_signature(signature).into(),
            Self::Bellatrix(block) => block.with_signature(signature).into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(bound = "", untagged)]
pub enum SignedBeaconBlock<P: Preset> {
    Phase0(Phase0SignedBeaconBlock<P>),
    Altair(AltairSignedBeaconBlock<P>),
    Bellatrix(BellatrixSignedBeaconBlock<P>),
}

impl<P: Preset> From<Phase0SignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: Phase0SignedBeaconBlock<P>) -> Self {
        Self::Phase0(block)
    }
}

impl<P: Preset> From<AltairSignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: AltairSignedBeaconBlock<P>) -> Self {
        Self::Altair(block)
    }
}

impl<P: Preset> From<BellatrixSignedBeaconBlock<P>> for SignedBeaconBlock<P> {
    fn from(block: BellatrixSignedBeaconBlock<P>) -> Self {
        Self::Bellatrix(block)
    }
}

impl<P: Preset> SszHash for SignedBeaconBlock<P> {
    fn hash_tree_root(&self) -> H256 {
        match self {
            Self::Phase0(block) => block.hash_tree_root(),
            Self::Altair(block) => block.hash_tree_root(),
            Self::Bellatrix(block) => block.hash_tree_root(),
        }
    }
}

impl<P: Preset> SignedBeaconBlock<P> {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Phase0(_) => Phase::Phase0,
            Self::Altair(_) => Phase::Altair,
            Self::Bellatrix(_) => Phase::Bellatrix,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        match self {
            Self::Phase0(block) => block.message.slot,
            Self::Altair(block) => block.message.slot,
            Self::Bellatrix(block) => block.message.slot,
        }
    }

    #[must_use]
    pub const fn proposer_index(&self) -> ValidatorIndex {
        match self {
            Self::Phase0(block) => block.message.proposer_index,
            Self::Altair(block) => block.message.proposer_index,
            Self::Bellatrix(block) => block.message.proposer_index,
        }
    }

    #[must_use]
    pub const fn signature(&self) -> SignatureBytes {
        match self {
            Self::Phase0(block) => block.signature,
            Self::Altair(block) => block.signature,
            Self::Bellatrix(block) => block.signature,
        }
    }

    /// Root of the block message, not of the signed envelope.
    #[must_use]
    pub fn message_root(&self) -> H256 {
        match self {
            Self::Phase0(block) => block.message.hash_tree_root(),
            Self::Altair(block) => block.message.hash_tree_root(),
            Self::Bellatrix(block) => block.message.hash_tree_root(),
        }
    }

    #[must_use]
    pub fn split(self) -> (BeaconBlock<P>, SignatureBytes) {
        match self {
            Self::Phase0(block) => (block.message.into(), block.signature),
            Self::Altair(block) => (block.message.into(), block.signature),
            Self::Bellatrix(block) => (block.message.into(), block.signature),
        }
    }

    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        match self {
            Self::Phase0(block) => block.message.to_header(),
            Self::Altair(block) => block.message.to_header(),
            Self::Bellatrix(block) => block.message.to_header(),
        }
    }
}
