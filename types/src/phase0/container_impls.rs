use ssz::{merkleize_bytes, merkleize_chunks, merkleize_fields, mix_in_length, SszHash};
use typenum::Unsigned as _;

use crate::{
    phase0::{
        consts::DEPOSIT_CONTRACT_TREE_DEPTH,
        containers::{
            AggregateAndProof, Attestation, AttestationData, AttesterSlashing, BeaconBlock,
            BeaconBlockBody, BeaconBlockHeader, Checkpoint, Deposit, DepositData, Eth1Data, Fork,
            ForkData, IndexedAttestation, ProposerSlashing, SignedAggregateAndProof,
            SignedBeaconBlock, SignedBeaconBlockHeader, SignedVoluntaryExit, SigningData,
            VoluntaryExit,
        },
        primitives::{H256, H32},
    },
    preset::Preset,
};

impl SszHash for H32 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = [0_u8; 32];
        chunk[..4].copy_from_slice(self.as_bytes());
        H256(chunk)
    }
}

impl SszHash for Checkpoint {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.epoch.hash_tree_root(), self.root])
    }
}

impl SszHash for AttestationData {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.index.hash_tree_root(),
            self.beacon_block_root,
            self.source.hash_tree_root(),
            self.target.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for Attestation<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.aggregation_bits.hash_tree_root(),
            self.data.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for AggregateAndProof<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.aggregator_index.hash_tree_root(),
            self.aggregate.hash_tree_root(),
            self.selection_proof.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for SignedAggregateAndProof<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.message.hash_tree_root(), self.signature.hash_tree_root()])
    }
}

impl<P: Preset> SszHash for IndexedAttestation<P> {
    fn hash_tree_root(&self) -> H256 {
        // `attesting_indices` is a list of packed `uint64`s, not of composites.
        let mut bytes = Vec::with_capacity(self.attesting_indices.len() * 8);

        for index in &self.attesting_indices {
            bytes.extend_from_slice(&index.to_le_bytes());
        }

        let chunk_limit = (P::MaxValidatorsPerCommittee::U64 * 8).div_ceil(32);
        let indices_root = mix_in_length(
            merkleize_bytes(&bytes, chunk_limit),
            self.attesting_indices.len(),
        );

        merkleize_fields(&[
            indices_root,
            self.data.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl<P: Preset> SszHash for AttesterSlashing<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.attestation_1.hash_tree_root(),
            self.attestation_2.hash_tree_root(),
        ])
    }
}

impl SszHash for BeaconBlockHeader {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.slot.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

impl SszHash for SignedBeaconBlockHeader {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.message.hash_tree_root(), self.signature.hash_tree_root()])
    }
}

impl SszHash for ProposerSlashing {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.signed_header_1.hash_tree_root(),
            self.signed_header_2.hash_tree_root(),
        ])
    }
}

impl SszHash for Eth1Data {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.deposit_root,
            self.deposit_count.hash_tree_root(),
            self.block_hash,
        ])
    }
}

impl SszHash for DepositData {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.pubkey.hash_tree_root(),
            self.withdrawal_credentials,
            self.amount.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl SszHash for Deposit {
    fn hash_tree_root(&self) -> H256 {
        // The proof is a vector of `DEPOSIT_CONTRACT_TREE_DEPTH + 1` roots.
        let proof_root = merkleize_chunks(&self.proof, DEPOSIT_CONTRACT_TREE_DEPTH as u64 + 1);
        merkleize_fields(&[proof_root, self.data.hash_tree_root()])
    }
}

impl SszHash for VoluntaryExit {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.epoch.hash_tree_root(),
            self.validator_index.hash_tree_root(),
        ])
    }
}

impl SszHash for SignedVoluntaryExit {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.message.hash_tree_root(), self.signature.hash_tree_root()])
    }
}

impl SszHash for Fork {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.previous_version.hash_tree_root(),
            self.current_version.hash_tree_root(),
            self.epoch.hash_tree_root(),
        ])
    }
}

impl SszHash for ForkData {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[
            self.current_version.hash_tree_root(),
            self.genesis_validators_root,
        ])
    }
}

impl SszHash for SigningData {
    fn hash_tree_root(&self) -> H256 {
        merkleize_fields(&[self.object_root, self.domain])
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
