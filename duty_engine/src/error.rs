use types::phase0::primitives::{Epoch, Slot, ValidatorIndex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "not synced: head slot {head_slot} is more than \
         {sync_horizon} slots behind wall slot {wall_slot}"
    )]
    NotSynced {
        head_slot: Slot,
        sync_horizon: u64,
        wall_slot: Slot,
    },
    #[error("doppelganger listen window is active until epoch {broadcast_start_epoch}")]
    Doppelganger { broadcast_start_epoch: Epoch },
    #[error("head slot {head_slot} is already at or past duty slot {slot}")]
    HeadAheadOfSlot { head_slot: Slot, slot: Slot },
    #[error("pending eth1 deposits could not be resolved")]
    Eth1DepositsUnavailable,
    #[error("slashing protection rejected the duty for validator {validator_index}")]
    SlashingProtectionTripped { validator_index: ValidatorIndex },
    #[error("signer failed: {message}")]
    SignerFailure { message: String },
    #[error("gossip validation rejected the message: {reason}")]
    GossipRejected { reason: String },
    #[error(
        "sync committee message for slot {slot} belongs to period {period}, \
         expected period {current_period} or {next_period}"
    )]
    SyncCommitteePeriodMismatch {
        slot: Slot,
        period: u64,
        current_period: u64,
        next_period: u64,
    },
    #[error("validator index {validator_index} is out of range ({validator_count} validators)")]
    ValidatorIndexOutOfRange {
        validator_index: ValidatorIndex,
        validator_count: u64,
    },
    #[error("validator {validator_index} is not a member of the sync committee")]
    NotInSyncCommittee { validator_index: ValidatorIndex },
}
