use core::marker::PhantomData;
use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use bls::PublicKeyBytes;
use futures::future::BoxFuture;
use ssz::BitVector;
use thiserror::Error;
use typenum::Unsigned as _;
use types::{
    altair::{consts::SyncCommitteeSubnetCount, primitives::SubcommitteeIndex},
    combined::{BeaconBlock, SignedBeaconBlock},
    phase0::{
        containers::{Checkpoint, Deposit, Eth1Data},
        primitives::{
            CommitteeIndex, Epoch, Gwei, Slot, SyncCommitteePeriod, UnixSeconds, ValidatorIndex,
            H256,
        },
    },
    preset::Preset,
};

/// A block in the chain DAG, identified by slot and root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockRef {
    pub slot: Slot,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Eth1Error {
    #[error("pending deposits for the eth1 vote could not be resolved")]
    DepositsUnavailable,
}

/// Everything the engine needs to know about one epoch of one chain view:
/// committee assignments, the proposer schedule, validator keys, and the
/// checkpoints attestations vote for.
pub struct EpochRef<P: Preset> {
    epoch: Epoch,
    justified_checkpoint: Checkpoint,
    epoch_boundary_root: H256,
    committees: BTreeMap<Slot, Vec<Vec<ValidatorIndex>>>,
    proposers: BTreeMap<Slot, ValidatorIndex>,
    validator_keys: Arc<Vec<PublicKeyBytes>>,
    phantom: PhantomData<P>,
}

impl<P: Preset> EpochRef<P> {
    #[must_use]
    pub fn new(
        epoch: Epoch,
        justified_checkpoint: Checkpoint,
        epoch_boundary_root: H256,
        committees: BTreeMap<Slot, Vec<Vec<ValidatorIndex>>>,
        proposers: BTreeMap<Slot, ValidatorIndex>,
        validator_keys: Arc<Vec<PublicKeyBytes>>,
    ) -> Self {
        Self {
            epoch,
            justified_checkpoint,
            epoch_boundary_root,
            committees,
            proposers,
            validator_keys,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Checkpoint {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn epoch_boundary_root(&self) -> H256 {
        self.epoch_boundary_root
    }

    #[must_use]
    pub fn committees_at_slot(&self, slot: Slot) -> u64 {
        self.committees
            .get(&slot)
            .map(|committees| committees.len() as u64)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn committee(&self, slot: Slot, committee_index: CommitteeIndex) -> Option<&[ValidatorIndex]> {
        self.committees
            .get(&slot)?
            .get(usize::try_from(committee_index).ok()?)
            .map(Vec::as_slice)
    }

    pub fn committees(
        &self,
        slot: Slot,
    ) -> impl Iterator<Item = (CommitteeIndex, &[ValidatorIndex])> {
        self.committees
            .get(&slot)
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(committee_index, committee)| {
                (committee_index as CommitteeIndex, committee.as_slice())
            })
    }

    #[must_use]
    pub fn proposer(&self, slot: Slot) -> Option<ValidatorIndex> {
        self.proposers.get(&slot).copied()
    }

    #[must_use]
    pub fn public_key(&self, validator_index: ValidatorIndex) -> Option<PublicKeyBytes> {
        self.validator_keys
            .get(usize::try_from(validator_index).ok()?)
            .copied()
    }
}

/// The sync committee owning one period, in committee order. A validator may
/// occupy multiple positions.
pub struct SyncCommitteeRef {
    pub period: SyncCommitteePeriod,
    pub members: Vec<(ValidatorIndex, PublicKeyBytes)>,
}

impl SyncCommitteeRef {
    /// Which subcommittees the validator occupies positions in.
    #[must_use]
    pub fn subnets_for_validator<P: Preset>(
        &self,
        validator_index: ValidatorIndex,
    ) -> BitVector<SyncCommitteeSubnetCount> {
        let mut subnets = BitVector::default();

        for (position, (member_index, _)) in self.members.iter().enumerate() {
            if *member_index == validator_index {
                subnets.set(position / P::SyncSubcommitteeSize::USIZE, true);
            }
        }

        subnets
    }

    pub fn subcommittee_members<P: Preset>(
        &self,
        subcommittee_index: SubcommitteeIndex,
    ) -> impl Iterator<Item = (ValidatorIndex, PublicKeyBytes)> + '_ {
        let subcommittee_size = P::SyncSubcommitteeSize::USIZE;
        let start = subcommittee_index as usize * subcommittee_size;

        self.members
            .iter()
            .skip(start)
            .take(subcommittee_size)
            .copied()
    }

    #[must_use]
    pub fn contains(&self, validator_index: ValidatorIndex) -> bool {
        self.members
            .iter()
            .any(|(member_index, _)| *member_index == validator_index)
    }
}

/// The fork-choice side of the node, as seen by the duty engine. All methods
/// answer against a specific head so duties survive reorgs mid-slot.
pub trait ChainView<P: Preset>: Send + Sync + 'static {
    fn head(&self) -> BlockRef;

    /// The ancestor of `head` at `slot`, or `head` itself if it is not newer.
    fn block_at_slot(&self, head: BlockRef, slot: Slot) -> BlockRef;

    /// Resolves when a block for `slot` has been processed. May stay pending
    /// forever; the attestation cutoff races it against the deadline.
    fn expect_block(&self, slot: Slot) -> BoxFuture<'static, BlockRef>;

    fn get_proposer(&self, head: BlockRef, slot: Slot) -> Result<Option<ValidatorIndex>>;

    fn get_epoch_ref(&self, head: BlockRef, epoch: Epoch) -> Result<Arc<EpochRef<P>>>;

    /// The sync committee that owns `slot`, or `None` before Altair.
    fn sync_committee_at(&self, head: BlockRef, slot: Slot)
        -> Result<Option<Arc<SyncCommitteeRef>>>;

    fn genesis_validators_root(&self) -> H256;

    fn genesis_time(&self) -> UnixSeconds;

    fn validator_count(&self) -> u64;

    fn index_of_public_key(&self, public_key: PublicKeyBytes) -> Option<ValidatorIndex>;

    fn public_key(&self, validator_index: ValidatorIndex) -> Option<PublicKeyBytes>;

    fn validator_balance(&self, validator_index: ValidatorIndex) -> Option<Gwei>;

    fn eth1_vote(&self) -> Eth1Data;

    fn pending_deposits(&self, eth1_data: Eth1Data) -> Result<Vec<Deposit>, Eth1Error>;

    /// Runs the state transition for `block` on top of `head` and returns the
    /// post-state root.
    fn post_state_root(&self, head: BlockRef, block: &BeaconBlock<P>) -> Result<H256>;

    /// Hands a signed block to the block processor. Returns whether the block
    /// was accepted into the chain DAG.
    fn store_block(&self, block: Arc<SignedBeaconBlock<P>>) -> BoxFuture<'_, Result<bool>>;
}
