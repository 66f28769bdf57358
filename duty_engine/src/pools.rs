use ssz::ContiguousList;
use types::{
    altair::{
        containers::{SyncAggregate, SyncCommitteeContribution},
        primitives::SubcommitteeIndex,
    },
    phase0::{
        containers::Attestation,
        primitives::{CommitteeIndex, Slot, H256},
    },
    preset::Preset,
};

/// The attestation pool, as consumed during block assembly and aggregation.
pub trait AttestationPool<P: Preset>: Send + Sync + 'static {
    /// The best attestations to include in a block proposed at `slot`.
    fn attestations_for_block(&self, slot: Slot)
        -> ContiguousList<Attestation<P>, P::MaxAttestations>;

    /// The best aggregate for `(slot, committee_index)`, if any singular
    /// attestations were collected.
    fn aggregated_attestation(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Option<Attestation<P>>;
}

/// The sync-committee message pool.
pub trait SyncCommitteePool<P: Preset>: Send + Sync + 'static {
    /// The aggregate over all subcommittees for block assembly. Empty when no
    /// messages for `beacon_block_root` were collected.
    fn sync_aggregate(&self, beacon_block_root: H256, slot: Slot) -> SyncAggregate<P>;

    fn produce_contribution(
        &self,
        slot: Slot,
        beacon_block_root: H256,
        subcommittee_index: SubcommitteeIndex,
    ) -> Option<SyncCommitteeContribution<P>>;
}
