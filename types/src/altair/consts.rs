use hex_literal::hex;
use typenum::U4;

use crate::phase0::primitives::{DomainType, H32};

pub const DOMAIN_SYNC_COMMITTEE: DomainType = H32(hex!("07000000"));
pub const DOMAIN_SYNC_COMMITTEE_SELECTION_PROOF: DomainType = H32(hex!("08000000"));
pub const DOMAIN_CONTRIBUTION_AND_PROOF: DomainType = H32(hex!("09000000"));

pub const TARGET_AGGREGATORS_PER_SYNC_SUBCOMMITTEE: u64 = 16;

pub type SyncCommitteeSubnetCount = U4;
