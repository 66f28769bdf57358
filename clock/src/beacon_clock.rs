use core::time::Duration;
use std::time::SystemTime;

use anyhow::Result;
use tokio::time::Instant;
use types::{
    config::Config,
    phase0::{consts::GENESIS_SLOT, primitives::{Slot, UnixSeconds}},
};

use crate::tick_duration;

/// Genesis-anchored deadline arithmetic. Duty paths wait on [`Instant`]s
/// produced here, so a test can anchor the clock to a paused Tokio timeline
/// and drive every wait deterministically.
pub struct BeaconClock {
    slot_duration: Duration,
    tick_duration: Duration,
    source: Source,
}

enum Source {
    /// Deadlines derived from the wall clock on each query.
    System { genesis_time: UnixSeconds },
    /// Deadlines derived from a fixed genesis instant.
    Anchored { genesis_instant: Instant },
}

impl BeaconClock {
    #[must_use]
    pub fn new(config: &Config, genesis_time: UnixSeconds) -> Self {
        Self {
            slot_duration: config.slot_duration(),
            tick_duration: tick_duration(config),
            source: Source::System { genesis_time },
        }
    }

    /// Anchors genesis to an explicit instant. Meant for tests running under
    /// a paused Tokio clock.
    #[must_use]
    pub fn anchored_at(config: &Config, genesis_instant: Instant) -> Self {
        Self {
            slot_duration: config.slot_duration(),
            tick_duration: tick_duration(config),
            source: Source::Anchored { genesis_instant },
        }
    }

    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn current_slot(&self) -> Result<Slot> {
        let since_genesis = match &self.source {
            Source::System { genesis_time } => {
                let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
                now.saturating_sub(Duration::from_secs(*genesis_time))
            }
            Source::Anchored { genesis_instant } => {
                Instant::now().saturating_duration_since(*genesis_instant)
            }
        };

        Ok(GENESIS_SLOT + since_genesis.as_secs() / self.slot_duration.as_secs())
    }

    /// The instant `interval` thirds plus `extra` into `slot`.
    ///
    /// If the scheduled time is already in the past, the current instant is
    /// returned, so waits on overdue deadlines complete immediately.
    #[must_use]
    pub fn deadline(&self, slot: Slot, interval: u32, extra: Duration) -> Instant {
        let since_genesis = self
            .slot_duration
            .saturating_mul(u32::try_from(slot - GENESIS_SLOT).unwrap_or(u32::MAX))
            .saturating_add(self.tick_duration.saturating_mul(interval))
            .saturating_add(extra);

        match &self.source {
            Source::System { genesis_time } => {
                let now_instant = Instant::now();

                let now = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or_default()
                    .saturating_sub(Duration::from_secs(*genesis_time));

                match since_genesis.checked_sub(now) {
                    Some(remaining) => now_instant + remaining,
                    None => now_instant,
                }
            }
            Source::Anchored { genesis_instant } => *genesis_instant + since_genesis,
        }
    }

    #[must_use]
    pub fn slot_start(&self, slot: Slot) -> Instant {
        self.deadline(slot, 0, Duration::ZERO)
    }
}
