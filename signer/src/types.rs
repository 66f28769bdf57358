use bls::PublicKeyBytes;
use serde::Serialize;
use types::{
    altair::containers::{
        BeaconBlock as AltairBeaconBlock, ContributionAndProof, SyncAggregatorSelectionData,
    },
    bellatrix::containers::BeaconBlock as BellatrixBeaconBlock,
    combined::BeaconBlock as CombinedBeaconBlock,
    phase0::{
        containers::{
            AggregateAndProof, AttestationData, BeaconBlock as Phase0BeaconBlock,
            BeaconBlockHeader, Fork, VoluntaryExit,
        },
        primitives::{Epoch, Slot, H256},
    },
    preset::Preset,
};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ForkInfo {
    pub fork: Fork,
    pub genesis_validators_root: H256,
}

#[derive(Debug)]
pub struct SigningTriple<'block, P: Preset> {
    pub message: SigningMessage<'block, P>,
    pub signing_root: H256,
    pub public_key: PublicKeyBytes,
}

#[derive(Debug, Serialize)]
#[serde(bound = "", rename_all = "snake_case")]
pub enum SigningMessage<'block, P: Preset> {
    AggregationSlot {
        #[serde(with = "serde_utils::string_or_native")]
        slot: Slot,
    },
    AggregateAndProof(Box<AggregateAndProof<P>>),
    Attestation(AttestationData),
    BeaconBlock(SigningBlock<'block, P>),
    RandaoReveal {
        #[serde(with = "serde_utils::string_or_native")]
        epoch: Epoch,
    },
    SyncCommitteeMessage {
        beacon_block_root: H256,
        #[serde(with = "serde_utils::string_or_native")]
        slot: Slot,
    },
    SyncAggregatorSelectionData(SyncAggregatorSelectionData),
    ContributionAndProof(ContributionAndProof<P>),
    VoluntaryExit(VoluntaryExit),
}

impl<P: Preset> SigningMessage<'_, P> {
    /// The `type` tag Web3Signer expects for this request.
    #[must_use]
    pub const fn web3signer_type(&self) -> &'static str {
        match self {
            Self::AggregationSlot { .. } => "AGGREGATION_SLOT",
            Self::AggregateAndProof(_) => "AGGREGATE_AND_PROOF",
            Self::Attestation(_) => "ATTESTATION",
            Self::BeaconBlock(_) => "BLOCK_V2",
            Self::RandaoReveal { .. } => "RANDAO_REVEAL",
            Self::SyncCommitteeMessage { .. } => "SYNC_COMMITTEE_MESSAGE",
            Self::SyncAggregatorSelectionData(_) => "SYNC_COMMITTEE_SELECTION_PROOF",
            Self::ContributionAndProof(_) => "SYNC_COMMITTEE_CONTRIBUTION_AND_PROOF",
            Self::VoluntaryExit(_) => "VOLUNTARY_EXIT",
        }
    }
}

impl<'block, P: Preset> From<&'block Phase0BeaconBlock<P>> for SigningMessage<'block, P> {
    fn from(block: &'block Phase0BeaconBlock<P>) -> Self {
        Self::BeaconBlock(SigningBlock::Phase0 { block })
    }
}

impl<'block, P: Preset> From<&'block AltairBeaconBlock<P>> for SigningMessage<'block, P> {
    fn from(block: &'block AltairBeaconBlock<P>) -> Self {
        Self::BeaconBlock(SigningBlock::Altair { block })
    }
}

impl<P: Preset> From<&BellatrixBeaconBlock<P>> for SigningMessage<'_, P> {
    fn from(block: &BellatrixBeaconBlock<P>) -> Self {
        let block_header = block.to_header();
        Self::BeaconBlock(SigningBlock::Bellatrix { block_header })
    }
}

impl<'block, P: Preset> From<&'block CombinedBeaconBlock<P>> for SigningMessage<'block, P> {
    fn from(block: &'block CombinedBeaconBlock<P>) -> Self {
        match block {
            CombinedBeaconBlock::Phase0(block) => block.into(),
            CombinedBeaconBlock::Altair(block) => block.into(),
            CombinedBeaconBlock::Bellatrix(block) => block.into(),
        }
    }
}

// Web3Signer expects signing requests for Bellatrix and later phases to
// contain a `block_header` field instead of `block`. See:
// - <https://github.com/ConsenSys/web3signer/pull/547>
// - <https://consensys.github.io/web3signer/web3signer-eth2.html#tag/Signing/operation/ETH2_SIGN>
#[derive(Debug, Serialize)]
#[serde(bound = "", rename_all = "UPPERCASE", tag = "version")]
pub enum SigningBlock<'block, P: Preset> {
    Phase0 { block: &'block Phase0BeaconBlock<P> },
    Altair { block: &'block AltairBeaconBlock<P> },
    Bellatrix { block_header: BeaconBlockHeader },
}
