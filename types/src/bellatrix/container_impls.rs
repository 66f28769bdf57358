use ssz::{merkleize_fields, SszHash, H256};

use crate::{
    bellatrix::containers::{
        BeaconBlock, BeaconBlockBody, ExecutionPayload, SignedBeaconBlock,
    },
    phase0::containers::BeaconBlockHeader,
    preset::Preset,
};

impl<P: Preset> SszHash for ExecutionPayload<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.parent_hash,
            self.fee_recipient.hash_tree_root(),
            self.state_root,
            self.receipts_root,
            self.logs_bloom.hash_tree_root(),
            self.prev_randao,
            self.block_number.hash_tree_root(),
            self.gas_limit.hash_tree_root(),
            self.gas_used.hash_tree_root(),
            self.timestamp.hash_tree_root(),
            self.extra_data.hash_tree_root(),
            self.base_fee_per_gas.hash_tree_root(),
            self.block_hash,
            self.transactions.hash_tree_root(),
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
            self.execution_payload.hash_tree_root(),
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
