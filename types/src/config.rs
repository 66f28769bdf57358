use core::{num::NonZeroU64, time::Duration};

use hex_literal::hex;
use nonzero_ext::nonzero;

use crate::{
    nonstandard::Phase,
    phase0::{
        containers::Fork,
        primitives::{Epoch, Slot, UnixSeconds, Version, H32},
    },
    preset::Preset,
};

/// Runtime chain configuration: fork schedule and timing. Only the values the
/// duty engine consumes are represented.
#[derive(Clone, Debug)]
pub struct Config {
    pub config_name: &'static str,
    pub genesis_fork_version: Version,
    pub altair_fork_version: Version,
    pub altair_fork_epoch: Epoch,
    pub bellatrix_fork_version: Version,
    pub bellatrix_fork_epoch: Epoch,
    pub seconds_per_slot: NonZeroU64,
    pub min_genesis_time: UnixSeconds,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub const fn mainnet() -> Self {
        Self {
            config_name: "mainnet",
            genesis_fork_version: H32(hex!("00000000")),
            altair_fork_version: H32(hex!("01000000")),
            altair_fork_epoch: 74_240,
            bellatrix_fork_version: H32(hex!("02000000")),
            bellatrix_fork_epoch: 144_896,
            seconds_per_slot: nonzero!(12_u64),
            min_genesis_time: 1_606_824_000,
        }
    }

    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            config_name: "minimal",
            genesis_fork_version: H32(hex!("00000001")),
            altair_fork_version: H32(hex!("01000001")),
            altair_fork_epoch: Epoch::MAX,
            bellatrix_fork_version: H32(hex!("02000001")),
            bellatrix_fork_epoch: Epoch::MAX,
            seconds_per_slot: nonzero!(6_u64),
            min_genesis_time: 1_578_009_600,
        }
    }

    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot.get())
    }

    #[must_use]
    pub fn phase_at_epoch(&self, epoch: Epoch) -> Phase {
        if epoch >= self.bellatrix_fork_epoch {
            Phase::Bellatrix
        } else if epoch >= self.altair_fork_epoch {
            Phase::Altair
        } else {
            Phase::Phase0
        }
    }

    #[must_use]
    pub fn phase_at_slot<P: Preset>(&self, slot: Slot) -> Phase {
        use typenum::Unsigned as _;
        self.phase_at_epoch(slot / P::SlotsPerEpoch::U64)
    }

    #[must_use]
    pub fn version(&self, phase: Phase) -> Version {
        match phase {
            Phase::Phase0 => self.genesis_fork_version,
            Phase::Altair => self.altair_fork_version,
            Phase::Bellatrix => self.bellatrix_fork_version,
        }
    }

    #[must_use]
    pub fn fork_epoch(&self, phase: Phase) -> Epoch {
        match phase {
            Phase::Phase0 => 0,
            Phase::Altair => self.altair_fork_epoch,
            Phase::Bellatrix => self.bellatrix_fork_epoch,
        }
    }

    #[must_use]
    pub fn fork_version_at_epoch(&self, epoch: Epoch) -> Version {
        self.version(self.phase_at_epoch(epoch))
    }

    #[must_use]
    pub fn fork_at_epoch(&self, epoch: Epoch) -> Fork {
        let current_phase = self.phase_at_epoch(epoch);

        let previous_version = match current_phase {
            Phase::Phase0 => self.genesis_fork_version,
            Phase::Altair => self.genesis_fork_version,
            Phase::Bellatrix => self.altair_fork_version,
        };

        Fork {
            previous_version,
            current_version: self.version(current_phase),
            epoch: self.fork_epoch(current_phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::preset::Mainnet;

    use super::*;

    #[test]
    fn mainnet_phases_follow_the_fork_schedule() {
        let config = Config::mainnet();

        assert_eq!(config.phase_at_epoch(0), Phase::Phase0);
        assert_eq!(config.phase_at_epoch(74_239), Phase::Phase0);
        assert_eq!(config.phase_at_epoch(74_240), Phase::Altair);
        assert_eq!(config.phase_at_epoch(144_896), Phase::Bellatrix);
    }

    #[test]
    fn phase_at_slot_uses_the_preset_epoch_length() {
        let config = Config::mainnet();

        assert_eq!(config.phase_at_slot::<Mainnet>(74_240 * 32 - 1), Phase::Phase0);
        assert_eq!(config.phase_at_slot::<Mainnet>(74_240 * 32), Phase::Altair);
    }

    #[test]
    fn fork_at_epoch_reports_the_previous_version() {
        let config = Config::mainnet();
        let fork = config.fork_at_epoch(80_000);

        assert_eq!(fork.previous_version, config.genesis_fork_version);
        assert_eq!(fork.current_version, config.altair_fork_version);
        assert_eq!(fork.epoch, 74_240);
    }
}
