use core::num::NonZeroUsize;

use hex_literal::hex;
use nonzero_ext::nonzero;
use typenum::{U16, U64};

use crate::phase0::primitives::{DomainType, Epoch, Slot, H32};

pub const GENESIS_SLOT: Slot = 0;
pub const GENESIS_EPOCH: Epoch = 0;
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;

pub const INTERVALS_PER_SLOT: NonZeroUsize = nonzero!(3_usize);

pub const DOMAIN_AGGREGATE_AND_PROOF: DomainType = H32(hex!("06000000"));
pub const DOMAIN_BEACON_ATTESTER: DomainType = H32(hex!("01000000"));
pub const DOMAIN_BEACON_PROPOSER: DomainType = H32(hex!("00000000"));
pub const DOMAIN_RANDAO: DomainType = H32(hex!("02000000"));
pub const DOMAIN_SELECTION_PROOF: DomainType = H32(hex!("05000000"));
pub const DOMAIN_VOLUNTARY_EXIT: DomainType = H32(hex!("04000000"));

pub const TARGET_AGGREGATORS_PER_COMMITTEE: u64 = 16;

pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;

pub type AttestationSubnetCount = U64;
pub type TargetAggregatorsPerCommittee = U16;
