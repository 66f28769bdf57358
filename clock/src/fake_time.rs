use core::{convert::Infallible, time::Duration};

use crate::{InstantLike, SystemTimeLike};

/// A point in time represented as a duration since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Timespec(Duration);

impl Timespec {
    #[must_use]
    pub const fn from_secs(seconds: u64) -> Self {
        Self(Duration::from_secs(seconds))
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.as_secs()
    }

    #[must_use]
    pub const fn subsec_nanos(self) -> u32 {
        self.0.subsec_nanos()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FakeInstant(pub Timespec);

impl InstantLike for FakeInstant {
    fn checked_add(self, duration: Duration) -> Option<Self> {
        self.0 .0.checked_add(duration).map(Timespec).map(Self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FakeSystemTime(pub Timespec);

impl SystemTimeLike for FakeSystemTime {
    type Error = Infallible;

    const UNIX_EPOCH: Self = Self(Timespec(Duration::ZERO));

    fn duration_since(self, earlier: Self) -> Result<Duration, Self::Error> {
        Ok(self.0 .0.saturating_sub(earlier.0 .0))
    }
}
