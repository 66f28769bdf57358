use types::{
    altair::containers::{SignedContributionAndProof, SyncCommitteeMessage},
    combined::SignedBeaconBlock,
    phase0::{
        containers::{
            Attestation, AttesterSlashing, ProposerSlashing, SignedAggregateAndProof,
            SignedVoluntaryExit,
        },
        primitives::SubnetId,
    },
    preset::Preset,
};

/// Outcome of gossip validation. For self-produced messages both `Accept` and
/// `Ignore` are broadcast-eligible; only `Reject` suppresses the send.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ValidationOutcome {
    Accept,
    Ignore,
    Reject(String),
}

impl ValidationOutcome {
    #[must_use]
    pub const fn is_publishable(&self) -> bool {
        matches!(self, Self::Accept | Self::Ignore)
    }
}

/// Gossip validation, invoked for self-produced messages before broadcast and
/// for externally submitted messages on the API paths.
pub trait GossipValidator<P: Preset>: Send + Sync + 'static {
    fn validate_attestation(&self, attestation: &Attestation<P>) -> ValidationOutcome;

    fn validate_aggregate_and_proof(
        &self,
        aggregate: &SignedAggregateAndProof<P>,
    ) -> ValidationOutcome;

    fn validate_beacon_block(&self, block: &SignedBeaconBlock<P>) -> ValidationOutcome;

    fn validate_sync_committee_message(
        &self,
        message: &SyncCommitteeMessage,
        subnet_id: SubnetId,
    ) -> ValidationOutcome;

    fn validate_contribution_and_proof(
        &self,
        contribution: &SignedContributionAndProof<P>,
    ) -> ValidationOutcome;

    fn validate_voluntary_exit(&self, exit: &SignedVoluntaryExit) -> ValidationOutcome;

    fn validate_attester_slashing(&self, slashing: &AttesterSlashing<P>) -> ValidationOutcome;

    fn validate_proposer_slashing(&self, slashing: &ProposerSlashing) -> ValidationOutcome;
}
