use anyhow::Result;
use types::{
    bellatrix::containers::ExecutionPayload,
    phase0::primitives::{Slot, ValidatorIndex},
    preset::Preset,
};

use crate::chain::BlockRef;

/// The execution-layer payload provider, as consumed during block assembly.
/// Payload construction happens on the execution side; the engine only asks
/// for the payload to embed in a post-Bellatrix block.
pub trait PayloadProvider<P: Preset>: Send + Sync + 'static {
    fn execution_payload(
        &self,
        head: BlockRef,
        slot: Slot,
        proposer_index: ValidatorIndex,
    ) -> Result<ExecutionPayload<P>>;
}

/// Provider for networks without an execution layer and for tests. Blocks
/// built with it carry the default payload, which is only valid before the
/// Merge.
#[derive(Clone, Copy)]
pub struct NullPayloadProvider;

impl<P: Preset> PayloadProvider<P> for NullPayloadProvider {
    fn execution_payload(
        &self,
        _head: BlockRef,
        _slot: Slot,
        _proposer_index: ValidatorIndex,
    ) -> Result<ExecutionPayload<P>> {
        Ok(ExecutionPayload::default())
    }
}
