use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use arc_swap::{ArcSwap, Guard};
use bls::PublicKeyBytes;
use helper_functions::misc;
use log::warn;
use types::{
    phase0::{
        consts::GENESIS_SLOT,
        primitives::{Epoch, Slot},
    },
    preset::Preset,
};

use crate::error::Error;

const DOPPELGANGER_CHECK_DURATION_IN_EPOCHS: Epoch = 2;

#[derive(Clone, Copy)]
struct TrackedValidator {
    added_in_slot: Slot,
}

/// Startup listen window for own validators. A tracked validator becomes
/// broadcast-eligible two epochs after it was added, unless its activity is
/// observed on gossip first — observation poisons the key permanently.
pub struct DoppelgangerProtection {
    snapshot: ArcSwap<Snapshot>,
}

impl Default for DoppelgangerProtection {
    fn default() -> Self {
        Self::new()
    }
}

impl DoppelgangerProtection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn add_tracked_validators<P: Preset>(
        &self,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        current_slot: Slot,
    ) {
        let snapshot = self.load();

        let filtered_public_keys = public_keys
            .into_iter()
            .filter(|public_key| !snapshot.active_validators.contains(public_key))
            .collect::<Vec<_>>();

        if filtered_public_keys.is_empty() {
            return;
        }

        // No other node can have signed for keys that exist from genesis.
        if current_slot == GENESIS_SLOT {
            self.update(|snapshot| {
                let mut snapshot = snapshot.as_ref().clone();
                snapshot.active_validators.extend(&filtered_public_keys);
                snapshot
            });

            return;
        }

        self.update(|snapshot| {
            let mut snapshot = snapshot.as_ref().clone();

            for public_key in &filtered_public_keys {
                snapshot
                    .tracked_validators
                    .entry(*public_key)
                    .or_insert(TrackedValidator {
                        added_in_slot: current_slot,
                    });
            }

            snapshot
        });
    }

    /// Marks tracked validators whose listen window has elapsed as active.
    pub fn activate_validators_that_pass_checks<P: Preset>(&self, current_slot: Slot) {
        let check_duration_in_slots = check_duration_in_slots::<P>();

        let (validators_to_activate, validators_to_track): (HashMap<_, _>, HashMap<_, _>) = self
            .load()
            .tracked_validators
            .iter()
            .map(|(public_key, validator)| (*public_key, *validator))
            .partition(|(_, validator)| {
                validator.added_in_slot + check_duration_in_slots <= current_slot
            });

        if validators_to_activate.is_empty() {
            return;
        }

        self.update(|snapshot| {
            let mut snapshot = snapshot.as_ref().clone();

            snapshot
                .active_validators
                .extend(validators_to_activate.keys());

            snapshot.tracked_validators.clone_from(&validators_to_track);

            snapshot
        });
    }

    /// Records gossip activity attributed to one of our keys. Activity seen
    /// during the listen window is a doppelganger.
    pub fn observe_activity(&self, public_key: PublicKeyBytes) -> Result<(), Error> {
        let snapshot = self.load();

        if snapshot.poisoned_validators.contains(&public_key)
            || snapshot.tracked_validators.contains_key(&public_key)
        {
            warn!(
                "observed network activity for tracked validator {public_key:?} \
                 during the doppelganger listen window",
            );

            self.update(|snapshot| {
                let mut snapshot = snapshot.as_ref().clone();
                snapshot.tracked_validators.remove(&public_key);
                snapshot.poisoned_validators.insert(public_key);
                snapshot
            });

            return Err(Error::DoppelgangersDetected {
                public_keys: vec![public_key],
            });
        }

        Ok(())
    }

    /// The first epoch in which broadcasting is allowed for every key added
    /// at `added_in_slot`.
    #[must_use]
    pub fn broadcast_start_epoch<P: Preset>(&self, added_in_slot: Slot) -> Epoch {
        misc::compute_epoch_at_slot::<P>(added_in_slot + check_duration_in_slots::<P>())
    }

    #[must_use]
    pub fn load(&self) -> Guard<Arc<Snapshot>> {
        self.snapshot.load()
    }

    fn update<R, F>(&self, f: F) -> Arc<Snapshot>
    where
        F: FnMut(&Arc<Snapshot>) -> R,
        R: Into<Arc<Snapshot>>,
    {
        self.snapshot.rcu(f)
    }
}

fn check_duration_in_slots<P: Preset>() -> u64 {
    use typenum::Unsigned as _;
    DOPPELGANGER_CHECK_DURATION_IN_EPOCHS * P::SlotsPerEpoch::U64
}

#[derive(Clone, Default)]
pub struct Snapshot {
    // Validators that have passed the listen window.
    active_validators: HashSet<PublicKeyBytes>,
    // Validators still inside the listen window.
    tracked_validators: HashMap<PublicKeyBytes, TrackedValidator>,
    // Validators whose activity was seen elsewhere. Never signed for again.
    poisoned_validators: HashSet<PublicKeyBytes>,
}

impl Snapshot {
    #[must_use]
    pub fn is_validator_active(&self, public_key: PublicKeyBytes) -> bool {
        self.active_validators.contains(&public_key)
    }

    #[must_use]
    pub fn is_validator_poisoned(&self, public_key: PublicKeyBytes) -> bool {
        self.poisoned_validators.contains(&public_key)
    }
}
