use std::collections::{BTreeMap, BTreeSet};

use types::phase0::primitives::{CommitteeIndex, Slot, SubnetId, ValidatorIndex};

/// Duties are registered this many slots ahead of the wall slot so subnet
/// subscriptions can be established before traffic is expected.
pub const SUBNET_SUBSCRIPTION_LEAD_TIME_SLOTS: u64 = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AttestationDuty {
    pub slot: Slot,
    pub subnet_id: SubnetId,
    pub committee_index: CommitteeIndex,
    pub validator_index: ValidatorIndex,
    pub is_aggregator: bool,
}

/// Records upcoming duties one lookahead window in advance. The sync gating
/// logic consults it to learn when the next action is due.
#[derive(Default)]
pub struct ActionTracker {
    attestation_duties: BTreeMap<Slot, Vec<AttestationDuty>>,
    proposal_slots: BTreeSet<Slot>,
    registered_slots: BTreeSet<Slot>,
}

impl ActionTracker {
    #[must_use]
    pub fn needs_to_register_at_slot(&self, slot: Slot) -> bool {
        !self.registered_slots.contains(&slot)
    }

    pub fn mark_registered(&mut self, slot: Slot) {
        self.registered_slots.insert(slot);
    }

    pub fn record_attestation_duty(&mut self, duty: AttestationDuty) {
        self.attestation_duties.entry(duty.slot).or_default().push(duty);
    }

    pub fn record_proposal_slot(&mut self, slot: Slot) {
        self.proposal_slots.insert(slot);
    }

    #[must_use]
    pub fn attestation_duties_at(&self, slot: Slot) -> &[AttestationDuty] {
        self.attestation_duties
            .get(&slot)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The earliest slot at or after `slot` with a tracked attestation duty.
    #[must_use]
    pub fn next_attestation_slot(&self, slot: Slot) -> Option<Slot> {
        self.attestation_duties.range(slot..).next().map(|(slot, _)| *slot)
    }

    /// The earliest slot at or after `slot` with a tracked proposal.
    #[must_use]
    pub fn next_proposal_slot(&self, slot: Slot) -> Option<Slot> {
        self.proposal_slots.range(slot..).next().copied()
    }

    /// Discards everything before `slot`.
    pub fn prune(&mut self, slot: Slot) {
        self.attestation_duties = self.attestation_duties.split_off(&slot);
        self.proposal_slots = self.proposal_slots.split_off(&slot);
        self.registered_slots = self.registered_slots.split_off(&slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(slot: Slot, validator_index: ValidatorIndex) -> AttestationDuty {
        AttestationDuty {
            slot,
            subnet_id: 0,
            committee_index: 0,
            validator_index,
            is_aggregator: false,
        }
    }

    #[test]
    fn next_slots_answer_the_earliest_tracked_duty() {
        let mut tracker = ActionTracker::default();

        tracker.record_attestation_duty(duty(10, 1));
        tracker.record_attestation_duty(duty(12, 2));
        tracker.record_proposal_slot(11);

        assert_eq!(tracker.next_attestation_slot(9), Some(10));
        assert_eq!(tracker.next_attestation_slot(11), Some(12));
        assert_eq!(tracker.next_attestation_slot(13), None);
        assert_eq!(tracker.next_proposal_slot(10), Some(11));
        assert_eq!(tracker.next_proposal_slot(12), None);
    }

    #[test]
    fn pruning_discards_past_slots_only() {
        let mut tracker = ActionTracker::default();

        tracker.record_attestation_duty(duty(10, 1));
        tracker.record_attestation_duty(duty(12, 2));
        tracker.mark_registered(10);
        tracker.mark_registered(12);

        tracker.prune(11);

        assert_eq!(tracker.next_attestation_slot(0), Some(12));
        assert!(tracker.needs_to_register_at_slot(10));
        assert!(!tracker.needs_to_register_at_slot(12));
    }

    #[test]
    fn duties_accumulate_per_slot() {
        let mut tracker = ActionTracker::default();

        tracker.record_attestation_duty(duty(10, 1));
        tracker.record_attestation_duty(duty(10, 2));

        assert_eq!(tracker.attestation_duties_at(10).len(), 2);
        assert_eq!(tracker.attestation_duties_at(11).len(), 0);
    }
}
