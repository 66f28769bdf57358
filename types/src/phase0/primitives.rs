use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

pub use primitive_types::{H160, H256, U256};

pub type Slot = u64;
pub type Epoch = u64;
pub type CommitteeIndex = u64;
pub type ValidatorIndex = u64;
pub type SubnetId = u64;
pub type Gwei = u64;
pub type UnixSeconds = u64;
pub type SyncCommitteePeriod = u64;

pub type Domain = H256;
pub type DomainType = H32;
pub type Version = H32;
pub type ForkDigest = H32;

pub type ExecutionAddress = H160;
pub type ExecutionBlockHash = H256;

construct_fixed_hash! {
    pub struct H32(4);
}

impl_fixed_hash_serde!(H32, 4);
