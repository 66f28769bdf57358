use std::sync::Arc;

use futures::channel::mpsc::UnboundedSender;
use log::warn;
use types::{
    altair::{
        containers::{SignedContributionAndProof, SyncCommitteeMessage},
        primitives::SubcommitteeIndex,
    },
    combined::SignedBeaconBlock,
    phase0::{
        containers::{
            Attestation, AttesterSlashing, ProposerSlashing, SignedAggregateAndProof,
            SignedVoluntaryExit,
        },
        primitives::{CommitteeIndex, Epoch, Slot, SubnetId, ValidatorIndex},
    },
    preset::Preset,
};

/// Broadcasts from the duty engine to the network layer, one variant per
/// gossip topic.
pub enum DutyToP2p<P: Preset> {
    PublishBeaconBlock(Arc<SignedBeaconBlock<P>>),
    PublishSingularAttestation(Arc<Attestation<P>>, SubnetId),
    PublishAggregateAndProof(Box<SignedAggregateAndProof<P>>),
    PublishSyncCommitteeMessage(Box<(SubcommitteeIndex, SyncCommitteeMessage)>),
    PublishContributionAndProof(Box<SignedContributionAndProof<P>>),
    PublishVoluntaryExit(Box<SignedVoluntaryExit>),
    PublishAttesterSlashing(Box<AttesterSlashing<P>>),
    PublishProposerSlashing(Box<ProposerSlashing>),
}

impl<P: Preset> DutyToP2p<P> {
    pub fn send(self, tx: &UnboundedSender<Self>) {
        if tx.unbounded_send(self).is_err() {
            warn!("send to p2p failed because the receiver was dropped");
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BeaconCommitteeSubscription {
    pub validator_index: ValidatorIndex,
    pub committee_index: CommitteeIndex,
    pub committees_at_slot: u64,
    pub slot: Slot,
    pub is_aggregator: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyncCommitteeSubscription {
    pub validator_index: ValidatorIndex,
    pub sync_committee_indices: Vec<usize>,
    pub until_epoch: Epoch,
}

pub enum ToSubnetService {
    UpdateBeaconCommitteeSubscriptions(Slot, Vec<BeaconCommitteeSubscription>),
    UpdateSyncCommitteeSubscriptions(Epoch, Vec<SyncCommitteeSubscription>),
}

impl ToSubnetService {
    pub fn send(self, tx: &UnboundedSender<Self>) {
        if tx.unbounded_send(self).is_err() {
            warn!("send to subnet service failed because the receiver was dropped");
        }
    }
}
