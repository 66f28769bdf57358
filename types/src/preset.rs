use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use nonzero_ext::nonzero;
use typenum::{
    Unsigned, U1048576, U1073741824, U128, U16, U2, U2048, U32, U512, U8,
};

/// Compile-time constants that differ between the mainnet and minimal
/// configurations. Runtime-configurable values live in [`crate::config::Config`].
pub trait Preset: Copy + Eq + Ord + Hash + Debug + Default + Send + Sync + 'static {
    type SlotsPerEpoch: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxValidatorsPerCommittee: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxProposerSlashings: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxAttesterSlashings: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxAttestations: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxDeposits: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxVoluntaryExits: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type SyncCommitteeSize: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type SyncSubcommitteeSize: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxBytesPerTransaction: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxTransactionsPerPayload: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;
    type MaxExtraDataBytes: Unsigned + Send + Sync + Eq + Ord + Hash + Debug;

    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: NonZeroU64;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type SlotsPerEpoch = U32;
    type MaxValidatorsPerCommittee = U2048;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type SyncCommitteeSize = U512;
    type SyncSubcommitteeSize = U128;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type MaxExtraDataBytes = U32;

    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: NonZeroU64 = nonzero!(256_u64);
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type SlotsPerEpoch = U8;
    type MaxValidatorsPerCommittee = U2048;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type SyncCommitteeSize = U32;
    type SyncSubcommitteeSize = U8;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type MaxExtraDataBytes = U32;

    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: NonZeroU64 = nonzero!(8_u64);
}
