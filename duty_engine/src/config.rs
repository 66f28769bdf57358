use std::path::PathBuf;

use types::phase0::primitives::H256;

#[derive(Clone, Debug)]
pub struct DutyEngineConfig {
    /// Graffiti values cycled across proposals.
    pub graffiti: Vec<H256>,
    /// Maximum distance between the head and the wall slot before duties are
    /// considered unsafe to perform.
    pub sync_horizon: u64,
    pub doppelganger_detection: bool,
    /// Directory for raw dumps of self-produced messages.
    pub dump_directory: Option<PathBuf>,
}

impl Default for DutyEngineConfig {
    fn default() -> Self {
        Self {
            graffiti: vec![],
            sync_horizon: 32,
            doppelganger_detection: false,
            dump_directory: None,
        }
    }
}
