use core::fmt;

use serde::{Deserialize, Serialize};

/// Named forks the chain progresses through. Ordering follows activation
/// order, so phases can be compared with `>=`.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Phase0,
    Altair,
    Bellatrix,
}

impl fmt::Display for Phase {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Phase0 => "phase0",
            Self::Altair => "altair",
            Self::Bellatrix => "bellatrix",
        };

        formatter.write_str(name)
    }
}
