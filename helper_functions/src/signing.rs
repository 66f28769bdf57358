use derive_more::From;
use ssz::SszHash;
use types::{
    altair::{
        consts::{
            DOMAIN_CONTRIBUTION_AND_PROOF, DOMAIN_SYNC_COMMITTEE,
            DOMAIN_SYNC_COMMITTEE_SELECTION_PROOF,
        },
        containers::{BeaconBlock as AltairBeaconBlock, ContributionAndProof,
            SyncAggregatorSelectionData},
    },
    bellatrix::containers::BeaconBlock as BellatrixBeaconBlock,
    combined::BeaconBlock as CombinedBeaconBlock,
    config::Config,
    phase0::{
        consts::{
            DOMAIN_AGGREGATE_AND_PROOF, DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER,
            DOMAIN_RANDAO, DOMAIN_SELECTION_PROOF, DOMAIN_VOLUNTARY_EXIT,
        },
        containers::{
            AggregateAndProof, AttestationData, BeaconBlock as Phase0BeaconBlock, VoluntaryExit,
        },
        primitives::{DomainType, Epoch, Slot, H256},
    },
    preset::Preset,
};

use crate::misc;

// This wrapper is needed to differentiate between `Epoch` and `Slot`.
// They are aliased to the same type and thus cannot have different trait
// implementations.
#[derive(Clone, Copy, From)]
pub struct RandaoEpoch(pub Epoch);

impl SszHash for RandaoEpoch {
    fn hash_tree_root(&self) -> H256 {
        self.0.hash_tree_root()
    }
}

/// Objects signed under a domain tied to a single fork. The fork version is
/// resolved from the object's own epoch.
pub trait SignForSingleFork<P: Preset>: SszHash {
    const DOMAIN_TYPE: DomainType;

    fn signing_epoch(&self) -> Epoch;

    fn signing_root(&self, config: &Config, genesis_validators_root: H256) -> H256 {
        let version = config.fork_version_at_epoch(self.signing_epoch());

        let domain = misc::compute_domain(
            config,
            Self::DOMAIN_TYPE,
            Some(version),
            Some(genesis_validators_root),
        );

        misc::compute_signing_root(self, domain)
    }
}

/// Objects whose signing slot is not part of the object itself
/// (sync-committee messages sign a bare block root).
pub trait SignForSingleForkAtSlot<P: Preset>: SszHash {
    const DOMAIN_TYPE: DomainType;

    fn signing_root(&self, config: &Config, genesis_validators_root: H256, slot: Slot) -> H256 {
        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let version = config.fork_version_at_epoch(epoch);

        let domain = misc::compute_domain(
            config,
            Self::DOMAIN_TYPE,
            Some(version),
            Some(genesis_validators_root),
        );

        misc::compute_signing_root(self, domain)
    }
}

impl<P: Preset> SignForSingleFork<P> for AttestationData {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_ATTESTER;

    fn signing_epoch(&self) -> Epoch {
        self.target.epoch
    }
}

impl<P: Preset> SignForSingleFork<P> for AggregateAndProof<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_AGGREGATE_AND_PROOF;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.aggregate.data.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for RandaoEpoch {
    const DOMAIN_TYPE: DomainType = DOMAIN_RANDAO;

    fn signing_epoch(&self) -> Epoch {
        self.0
    }
}

/// Aggregation-selection signatures sign the bare slot number.
impl<P: Preset> SignForSingleFork<P> for Slot {
    const DOMAIN_TYPE: DomainType = DOMAIN_SELECTION_PROOF;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(*self)
    }
}

impl<P: Preset> SignForSingleFork<P> for VoluntaryExit {
    const DOMAIN_TYPE: DomainType = DOMAIN_VOLUNTARY_EXIT;

    fn signing_epoch(&self) -> Epoch {
        self.epoch
    }
}

impl<P: Preset> SignForSingleFork<P> for SyncAggregatorSelectionData {
    const DOMAIN_TYPE: DomainType = DOMAIN_SYNC_COMMITTEE_SELECTION_PROOF;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for ContributionAndProof<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_CONTRIBUTION_AND_PROOF;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.contribution.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for Phase0BeaconBlock<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for AltairBeaconBlock<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for BellatrixBeaconBlock<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for CombinedBeaconBlock<P> {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;

    fn signing_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot())
    }
}

/// Sync-committee messages sign the head block root directly.
impl<P: Preset> SignForSingleForkAtSlot<P> for H256 {
    const DOMAIN_TYPE: DomainType = DOMAIN_SYNC_COMMITTEE;
}

#[cfg(test)]
mod tests {
    use types::{phase0::containers::Checkpoint, preset::Minimal};

    use super::*;

    #[test]
    fn attestation_signing_roots_differ_by_target_epoch() {
        let config = Config::minimal();
        let genesis_validators_root = H256::repeat_byte(0xaa);

        let data = AttestationData::default();
        let later = AttestationData {
            target: Checkpoint {
                epoch: 1,
                root: H256::zero(),
            },
            ..data
        };

        assert_ne!(
            SignForSingleFork::<Minimal>::signing_root(&data, &config, genesis_validators_root),
            SignForSingleFork::<Minimal>::signing_root(&later, &config, genesis_validators_root),
        );
    }

    #[test]
    fn randao_and_selection_proof_roots_differ_for_equal_numbers() {
        let config = Config::minimal();
        let genesis_validators_root = H256::repeat_byte(0xbb);

        let epoch_root = SignForSingleFork::<Minimal>::signing_root(
            &RandaoEpoch(5),
            &config,
            genesis_validators_root,
        );
        let slot_root = SignForSingleFork::<Minimal>::signing_root(
            &5_u64,
            &config,
            genesis_validators_root,
        );

        assert_ne!(epoch_root, slot_root);
    }

    #[test]
    fn combined_block_root_matches_the_inner_variant() {
        let config = Config::minimal();
        let genesis_validators_root = H256::repeat_byte(0xcc);

        let inner = Phase0BeaconBlock::<Minimal>::default();
        let combined = CombinedBeaconBlock::from(inner.clone());

        assert_eq!(
            SignForSingleFork::<Minimal>::signing_root(&inner, &config, genesis_validators_root),
            SignForSingleFork::<Minimal>::signing_root(&combined, &config, genesis_validators_root),
        );
    }
}
