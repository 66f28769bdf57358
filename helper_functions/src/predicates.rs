use core::num::NonZeroU64;

use bls::SignatureBytes;
use typenum::Unsigned as _;
use types::{
    altair::consts::{SyncCommitteeSubnetCount, TARGET_AGGREGATORS_PER_SYNC_SUBCOMMITTEE},
    phase0::consts::TARGET_AGGREGATORS_PER_COMMITTEE,
    preset::Preset,
};

/// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/phase0/validator.md#aggregation-selection>
#[must_use]
pub fn is_aggregator(committee_size: usize, slot_signature: SignatureBytes) -> bool {
    let dividend = low_u64_of_hash(slot_signature);

    let modulo = (committee_size as u64 / TARGET_AGGREGATORS_PER_COMMITTEE)
        .try_into()
        .unwrap_or(NonZeroU64::MIN);

    dividend % modulo.get() == 0
}

/// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/altair/validator.md#aggregation-selection>
#[must_use]
pub fn is_sync_committee_aggregator<P: Preset>(selection_proof: SignatureBytes) -> bool {
    let dividend = low_u64_of_hash(selection_proof);

    let modulo = (P::SyncCommitteeSize::U64
        / SyncCommitteeSubnetCount::U64
        / TARGET_AGGREGATORS_PER_SYNC_SUBCOMMITTEE)
        .try_into()
        .unwrap_or(NonZeroU64::MIN);

    dividend % modulo.get() == 0
}

fn low_u64_of_hash(signature: SignatureBytes) -> u64 {
    let hash = hashing::hash_768(signature);

    hash[..8]
        .try_into()
        .map(u64::from_le_bytes)
        .expect("slice has the same length as u64")
}

#[cfg(test)]
mod tests {
    use types::preset::Minimal;

    use super::*;

    #[test]
    fn small_committees_always_select_aggregators() {
        // With fewer members than TARGET_AGGREGATORS_PER_COMMITTEE the modulo
        // clamps to 1, so every member is an aggregator.
        assert!(is_aggregator(4, SignatureBytes::repeat_byte(0x5b)));
        assert!(is_aggregator(15, SignatureBytes::repeat_byte(0xc7)));
    }

    #[test]
    fn selection_is_deterministic_in_the_signature() {
        let signature = SignatureBytes::repeat_byte(0x11);

        assert_eq!(
            is_aggregator(2048, signature),
            is_aggregator(2048, signature),
        );
    }

    #[test]
    fn minimal_sync_subcommittees_select_every_member() {
        // 32 / 4 / 16 == 0, clamped to 1.
        assert!(is_sync_committee_aggregator::<Minimal>(
            SignatureBytes::repeat_byte(0x2f),
        ));
    }
}
