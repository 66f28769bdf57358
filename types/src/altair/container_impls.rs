use ssz::{merkleize_fields, SszHash, H256};

use crate::{
    altair::containers::{
        BeaconBlock, BeaconBlockBody, ContributionAndProof, SignedBeaconBlock,
        SignedContributionAndProof, SyncAggregate, SyncAggregatorSelectionData,
        SyncCommitteeContribution, SyncCommitteeMessage,
    },
    phase0::containers::BeaconBlockHeader,
    preset::Preset,
};

impl SszHash for SyncCommitteeMessage {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.beacon_block_root,
            self.validator_index.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for SyncAggregate<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.sync_committee_bits.hash_tree_root(),
            self.sync_committee_signature.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for SyncCommitteeContribution<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.beacon_block_root,
            self.subcommittee_index.hash_tree_root(),
            self.aggregation_bits.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for ContributionAndProof<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.aggregator_index.hash_tree_root(),
            self.contribution.hash_tree_root(),
            self.selection_proof.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for SignedContributionAndProof<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.message.hash_tree_root(), self.signature.hash_tree_root()])
    }
}

impl SszHash for SyncAggregatorSelectionData {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.subcommittee_index.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for BeaconBlock<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
            self.parent_root,
            self.state_root,
            self.body.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for BeaconBlockBody<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.randao_reveal.hash_tree_root(),
            self.eth1_data.hash_tree_root(),
            self.graffiti,
            self.proposer_slashings.hash_tree_root(),
            self.attester_slashings.hash_tree_root(),
            self.attestations.hash_tree_root(),
            self.deposits.hash_tree_root(),
            self.voluntary_exits.hash_tree_root(),
            self.sync_aggregate.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for SignedBeaconBlock<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.message.hash_tree_root(), self.signature.hash_tree_root()])
    }
}

impl<P: Preset> BeaconBlock<P> {
    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
        }
    }

    #[must_use]
    pub fn with_state_root(mut self, state_root: H256) -> Self {
        self.state_root = state_root;
        self
    }

    #[must_use]
    pub fn with_signature(self, signature: bls::SignatureBytes) -> SignedBeaconBlock<P> {
        SignedBeaconBlock {
            message: self,
            signature,
        }
    }
}
