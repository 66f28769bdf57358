//! A [`Stream`]-based timer for the beacon chain slot schedule, plus the
//! instant arithmetic duty deadlines are computed from.
//!
//! The stream is implemented with [`Interval`]. An [`Interval`] may produce
//! items late, but the delays do not accumulate by default. [`Instant`]s are
//! opaque, so converting a Unix timestamp to one relies on sampling both
//! clocks at the same point in time; the error is negligible compared to
//! clock differences between nodes.
//!
//! [`Interval`]: tokio::time::Interval
//! [`Instant`]:  std::time::Instant

use core::{error::Error, time::Duration};
use std::time::{Instant, SystemTime, SystemTimeError};

use anyhow::Result;
use enum_iterator::Sequence;
use futures::stream::{Stream, StreamExt as _};
use helper_functions::misc;
use strum::AsRefStr;
use thiserror::Error;
use tokio_stream::wrappers::IntervalStream;
use types::{
    config::Config,
    phase0::{
        consts::GENESIS_SLOT,
        primitives::{Epoch, Slot, UnixSeconds},
    },
    preset::Preset,
};

#[cfg(test)]
mod fake_time;

mod beacon_clock;

pub use beacon_clock::BeaconClock;

pub trait InstantLike: Sized {
    fn checked_add(self, duration: Duration) -> Option<Self>;
}

pub trait SystemTimeLike: Copy {
    type Error: Error + Send + Sync + 'static;

    const UNIX_EPOCH: Self;

    fn duration_since(self, earlier: Self) -> Result<Duration, Self::Error>;
}

impl InstantLike for Instant {
    fn checked_add(self, duration: Duration) -> Option<Self> {
        Self::checked_add(&self, duration)
    }
}

impl SystemTimeLike for SystemTime {
    type Error = SystemTimeError;

    const UNIX_EPOCH: Self = Self::UNIX_EPOCH;

    fn duration_since(self, earlier: Self) -> Result<Duration, Self::Error> {
        Self::duration_since(&self, earlier)
    }
}

/// One interval of one slot. The duty schedule divides every slot into
/// [`INTERVALS_PER_SLOT`] intervals: proposals at the start, attestations a
/// third in, aggregates two thirds in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Tick {
    pub slot: Slot,
    pub kind: TickKind,
}

impl Tick {
    #[must_use]
    pub const fn start_of_slot(slot: Slot) -> Self {
        Self::new(slot, TickKind::Propose)
    }

    pub fn at_time(config: &Config, time: UnixSeconds, genesis_time: UnixSeconds) -> Result<Self> {
        let duration_since_unix_epoch = Duration::from_secs(time);
        Self::from_duration(config, duration_since_unix_epoch, genesis_time)
    }

    pub fn current(config: &Config, genesis_time: UnixSeconds) -> Result<Self> {
        let duration_since_unix_epoch = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
        Self::from_duration(config, duration_since_unix_epoch, genesis_time)
    }

    #[must_use]
    pub fn epoch<P: Preset>(self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }

    #[must_use]
    pub const fn is_start_of_slot(self) -> bool {
        matches!(self.kind, TickKind::Propose)
    }

    /// How late the wall clock is relative to this tick's scheduled time.
    pub fn delay(self, config: &Config, genesis_time: UnixSeconds) -> Result<Duration> {
        let duration_since_unix_epoch = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
        let unix_epoch_to_genesis = Duration::from_secs(genesis_time);

        let duration_since_genesis =
            duration_since_unix_epoch.saturating_sub(unix_epoch_to_genesis);

        let Self { slot, kind } = self;
        let slot_duration = config.slot_duration();
        let tick_duration = tick_duration(config);
        let duration_before_slot = slot_duration.saturating_mul((slot - GENESIS_SLOT).try_into()?);
        let duration_after_slot = tick_duration.saturating_mul(kind as u32);
        let duration_until_tick = duration_before_slot + duration_after_slot;

        Ok(duration_since_genesis.saturating_sub(duration_until_tick))
    }

    fn from_duration(
        config: &Config,
        duration_since_unix_epoch: Duration,
        genesis_time: UnixSeconds,
    ) -> Result<Self> {
        let unix_epoch_to_genesis = Duration::from_secs(genesis_time);

        // `Duration` does not implement `Div<Duration>` or `Rem<Duration>`,
        // so the arithmetic is done on nanoseconds.
        let nanos_since_genesis = duration_since_unix_epoch
            .saturating_sub(unix_epoch_to_genesis)
            .as_nanos();

        let nanos_per_tick = tick_duration(config).as_nanos();
        let ticks_per_slot = u128::try_from(TickKind::CARDINALITY)?;
        let ticks_since_genesis = nanos_since_genesis / nanos_per_tick;
        let slots_since_genesis = u64::try_from(ticks_since_genesis / ticks_per_slot)?;
        let ticks_since_slot = usize::try_from(ticks_since_genesis % ticks_per_slot)?;
        let slot = GENESIS_SLOT + slots_since_genesis;

        let kind = enum_iterator::all::<TickKind>()
            .nth(ticks_since_slot)
            .expect("more ticks would add up to additional slots");

        Ok(Self::new(slot, kind))
    }

    const fn new(slot: Slot, kind: TickKind) -> Self {
        Self { slot, kind }
    }

    fn next(self) -> Result<Self> {
        let Self { slot, kind } = self;

        let next_slot = match kind.next() {
            Some(_) => slot,
            None => slot.checked_add(1).ok_or(ClockError::RanOutOfSlots)?,
        };

        let next_kind = enum_iterator::next_cycle(&kind);

        Ok(Self::new(next_slot, next_kind))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Sequence, AsRefStr)]
pub enum TickKind {
    Propose,
    Attest,
    Aggregate,
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ClockError {
    #[error("time of next tick overflowed")]
    NextInstantOverflow,
    #[error("ran out of slots")]
    RanOutOfSlots,
}

pub fn ticks(
    config: &Config,
    genesis_time: UnixSeconds,
) -> Result<impl Stream<Item = Result<Tick>>> {
    // We assume the `Instant` and `SystemTime` obtained here correspond to
    // the same point in time.
    let now_instant = Instant::now();
    let now_system_time = SystemTime::now();

    let (mut next_tick, next_instant) =
        next_tick_with_instant(config, now_instant, now_system_time, genesis_time)?;

    let tick_duration = tick_duration(config);
    let interval = tokio::time::interval_at(next_instant.into(), tick_duration);

    Ok(IntervalStream::new(interval).map(move |_| {
        let current_tick = next_tick;
        next_tick = current_tick.next()?;
        Ok(current_tick)
    }))
}

fn next_tick_with_instant<I: InstantLike, S: SystemTimeLike>(
    config: &Config,
    now_instant: I,
    now_system_time: S,
    genesis_time: UnixSeconds,
) -> Result<(Tick, I)> {
    let unix_epoch_to_now = now_system_time.duration_since(S::UNIX_EPOCH)?;
    let unix_epoch_to_genesis = Duration::from_secs(genesis_time);

    // Some platforms do not support negative `Instant`s, so `Duration`s are
    // never subtracted from `Instant`s here. The `InstantLike` trait
    // conveniently prevents it.

    let mut next_tick;
    let mut now_to_next_tick;

    if unix_epoch_to_now <= unix_epoch_to_genesis {
        next_tick = Tick::start_of_slot(GENESIS_SLOT);
        now_to_next_tick = unix_epoch_to_genesis - unix_epoch_to_now;
    } else {
        let tick_duration = tick_duration(config);
        let genesis_to_now = unix_epoch_to_now - unix_epoch_to_genesis;
        let slots_since_genesis = genesis_to_now.as_secs() / config.seconds_per_slot.get();
        let genesis_to_current_slot =
            Duration::from_secs(slots_since_genesis * config.seconds_per_slot.get());
        let current_slot_to_now = genesis_to_now - genesis_to_current_slot;

        next_tick = Tick::start_of_slot(GENESIS_SLOT + slots_since_genesis);
        now_to_next_tick = Duration::ZERO;

        while now_to_next_tick < current_slot_to_now {
            next_tick = next_tick.next()?;
            now_to_next_tick += tick_duration;
        }

        now_to_next_tick -= current_slot_to_now;
    }

    let next_instant = now_instant
        .checked_add(now_to_next_tick)
        .ok_or(ClockError::NextInstantOverflow)?;

    Ok((next_tick, next_instant))
}

pub(crate) fn tick_duration(config: &Config) -> Duration {
    let ticks_per_slot_u32 =
        u32::try_from(TickKind::CARDINALITY).expect("number of ticks per slot fits in u32");

    config.slot_duration() / ticks_per_slot_u32
}
