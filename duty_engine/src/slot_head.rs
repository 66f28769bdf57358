use std::sync::Arc;

use anyhow::Result;
use helper_functions::{misc, signing::SignForSingleFork};
use types::{
    config::Config,
    phase0::{
        containers::{AttestationData, Checkpoint},
        primitives::{CommitteeIndex, Epoch, Slot, SubnetId, H256},
    },
    preset::Preset,
};

use crate::chain::{BlockRef, EpochRef};

/// The view duties for one slot are produced against: the (possibly rewound)
/// head and the epoch data resolved through it.
pub struct SlotHead<P: Preset> {
    pub config: Arc<Config>,
    pub head: BlockRef,
    pub slot: Slot,
    pub epoch_ref: Arc<EpochRef<P>>,
    pub genesis_validators_root: H256,
}

impl<P: Preset> SlotHead<P> {
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }

    /// The attestation contents every committee member of this slot votes
    /// for, varying only in the committee index.
    #[must_use]
    pub fn attestation_data(&self, committee_index: CommitteeIndex) -> AttestationData {
        AttestationData {
            slot: self.slot,
            index: committee_index,
            beacon_block_root: self.head.root,
            source: self.epoch_ref.justified_checkpoint(),
            target: Checkpoint {
                epoch: self.epoch(),
                root: self.epoch_ref.epoch_boundary_root(),
            },
        }
    }

    pub fn subnet_id(&self, slot: Slot, committee_index: CommitteeIndex) -> Result<SubnetId> {
        let committees_per_slot = self.epoch_ref.committees_at_slot(slot);
        misc::compute_subnet_for_attestation::<P>(committees_per_slot, slot, committee_index)
    }

    #[must_use]
    pub fn signing_root(&self, object: &impl SignForSingleFork<P>) -> H256 {
        object.signing_root(&self.config, self.genesis_validators_root)
    }
}
