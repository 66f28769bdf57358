use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz::{ByteList, ByteVector, ContiguousList};
use typenum::U256;

use crate::{
    altair::containers::{BeaconBlockBody as AltairBeaconBlockBody, SyncAggregate},
    bellatrix::primitives::Transaction,
    phase0::{
        containers::{
            Attestation, AttesterSlashing, Deposit, Eth1Data, ProposerSlashing,
            SignedVoluntaryExit,
        },
        primitives::{
            ExecutionAddress, ExecutionBlockHash, Gwei, Slot, UnixSeconds, ValidatorIndex, H256,
            U256 as Uint256,
        },
    },
    preset::Preset,
};

type LogsBloomSize = U256;

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct ExecutionPayload<P: Preset> {
    pub parent_hash: ExecutionBlockHash,
    pub fee_recipient: ExecutionAddress,
    pub state_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: ByteVector<LogsBloomSize>,
    pub prev_randao: H256,
    #[serde(with = "serde_utils::string_or_native")]
    pub block_number: u64,
    #[serde(with = "serde_utils::string_or_native")]
    pub gas_limit: Gwei,
    #[serde(with = "serde_utils::string_or_native")]
    pub gas_used: Gwei,
    #[serde(with = "serde_utils::string_or_native")]
    pub timestamp: UnixSeconds,
    pub extra_data: ByteList<P::MaxExtraDataBytes>,
    pub base_fee_per_gas: Uint256,
    pub block_hash: ExecutionBlockHash,
    pub transactions: ContiguousList<Transaction<P>, P::MaxTransactionsPerPayload>,
}

impl<P: Preset> Default for ExecutionPayload<P> {
    fn default() -> Self {
        Self {
            parent_hash: ExecutionBlockHash::default(),
            fee_recipient: ExecutionAddress::default(),
            state_root: H256::default(),
            receipts_root: H256::default(),
            logs_bloom: ByteVector::default(),
            prev_randao: H256::default(),
            block_number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: ByteList::default(),
            base_fee_per_gas: Uint256::zero(),
            block_hash: ExecutionBlockHash::default(),
            transactions: ContiguousList::default(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct BeaconBlock<P: Preset> {
    #[serde(with = "serde_utils::string_or_native")]
    pub slot: Slot,
    #[serde(with = "serde_utils::string_or_native")]
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody<P>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct BeaconBlockBody<P: Preset> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: H256,
    pub proposer_slashings: ContiguousList<ProposerSlashing, P::MaxProposerSlashings>,
    pub attester_slashings: ContiguousList<AttesterSlashing<P>, P::MaxAttesterSlashings>,
    pub attestations: ContiguousList<Attestation<P>, P::MaxAttestations>,
    pub deposits: ContiguousList<Deposit, P::MaxDeposits>,
    pub voluntary_exits: ContiguousList<SignedVoluntaryExit, P::MaxVoluntaryExits>,
    pub sync_aggregate: SyncAggregate<P>,
    pub execution_payload: ExecutionPayload<P>,
}

impl<P: Preset> Default for BeaconBlockBody<P> {
    fn default() -> Self {
        AltairBeaconBlockBody::default().into()
    }
}

impl<P: Preset> From<AltairBeaconBlockBody<P>> for BeaconBlockBody<P> {
    fn from(body: AltairBeaconBlockBody<P>) -> Self {
        let AltairBeaconBlockBody {
            randao_reveal,
            eth1_data,
            graffiti,
            proposer_slashings,
            attester_slashings,
            attestations,
            deposits,
            voluntary_exits,
            sync_aggregate,
        } = body;

        Self {
            randao_reveal,
            eth1_data,
            graffiti,
            proposer_slashings,
            attester_slashings,
            attestations,
            deposits,
            voluntary_exits,
            sync_aggregate,
            execution_payload: ExecutionPayload::default(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct SignedBeaconBlock<P: Preset> {
    pub message: BeaconBlock<P>,
    pub signature: SignatureBytes,
}
