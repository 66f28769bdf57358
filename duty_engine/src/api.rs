//! Handlers for externally submitted messages. Every handler runs gossip
//! validation and broadcasts on `Accept` or `Ignore`; a `Reject` is returned
//! to the caller verbatim.

use std::sync::Arc;

use anyhow::{ensure, Result};
use futures::stream::{FuturesOrdered, StreamExt as _};
use helper_functions::misc;
use itertools::Itertools as _;
use log::debug;
use types::{
    altair::{containers::{SignedContributionAndProof, SyncCommitteeMessage}, primitives::SubcommitteeIndex},
    combined::SignedBeaconBlock,
    phase0::{
        containers::{
            Attestation, AttesterSlashing, ProposerSlashing, SignedAggregateAndProof,
            SignedVoluntaryExit,
        },
        primitives::Slot,
    },
    preset::Preset,
};

use crate::{
    chain::{ChainView, SyncCommitteeRef},
    engine::DutyEngine,
    error::Error,
    gossip::{GossipValidator, ValidationOutcome},
    messages::DutyToP2p,
    payload_provider::PayloadProvider,
    pools::{AttestationPool, SyncCommitteePool},
};

impl<P, C, A, S, E, G> DutyEngine<P, C, A, S, E, G>
where
    P: Preset,
    C: ChainView<P>,
    A: AttestationPool<P>,
    S: SyncCommitteePool<P>,
    E: PayloadProvider<P>,
    G: GossipValidator<P>,
{
    pub async fn send_attestation(&self, attestation: Attestation<P>) -> Result<()> {
        match self.gossip_validator.validate_attestation(&attestation) {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            outcome => {
                debug_assert!(outcome.is_publishable());

                let subnet_id = self.attestation_subnet(attestation.data.slot, attestation.data.index)?;

                DutyToP2p::PublishSingularAttestation(Arc::new(attestation), subnet_id)
                    .send(&self.p2p_tx);

                Ok(())
            }
        }
    }

    pub async fn send_aggregate_and_proof(
        &self,
        aggregate: SignedAggregateAndProof<P>,
    ) -> Result<()> {
        match self.gossip_validator.validate_aggregate_and_proof(&aggregate) {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            _ => {
                DutyToP2p::PublishAggregateAndProof(Box::new(aggregate)).send(&self.p2p_tx);
                Ok(())
            }
        }
    }

    /// Broadcasts the block and hands it to the block processor. The returned
    /// flag reports whether the chain accepted it.
    pub async fn send_beacon_block(&self, block: SignedBeaconBlock<P>) -> Result<bool> {
        if let ValidationOutcome::Reject(reason) = self.gossip_validator.validate_beacon_block(&block)
        {
            return Err(Error::GossipRejected { reason }.into());
        }

        let block = Arc::new(block);

        DutyToP2p::PublishBeaconBlock(block.clone()).send(&self.p2p_tx);

        self.chain.store_block(block).await
    }

    pub fn send_voluntary_exit(&mut self, exit: SignedVoluntaryExit) -> Result<()> {
        let index_seen = self
            .voluntary_exits
            .iter()
            .map(|voluntary_exit| voluntary_exit.message.validator_index)
            .contains(&exit.message.validator_index);

        if index_seen {
            debug!("voluntary exit for the same validator was already submitted: {exit:?}");
            return Ok(());
        }

        match self.gossip_validator.validate_voluntary_exit(&exit) {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            _ => {
                self.voluntary_exits.push(exit);
                DutyToP2p::PublishVoluntaryExit(Box::new(exit)).send(&self.p2p_tx);
                Ok(())
            }
        }
    }

    pub fn send_attester_slashing(&mut self, slashing: AttesterSlashing<P>) -> Result<()> {
        match self.gossip_validator.validate_attester_slashing(&slashing) {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            _ => {
                self.attester_slashings.push(slashing.clone());
                DutyToP2p::PublishAttesterSlashing(Box::new(slashing)).send(&self.p2p_tx);
                Ok(())
            }
        }
    }

    pub fn send_proposer_slashing(&mut self, slashing: ProposerSlashing) -> Result<()> {
        match self.gossip_validator.validate_proposer_slashing(&slashing) {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            _ => {
                self.proposer_slashings.push(slashing);
                DutyToP2p::PublishProposerSlashing(Box::new(slashing)).send(&self.p2p_tx);
                Ok(())
            }
        }
    }

    pub fn send_sync_committee_contribution(
        &self,
        contribution: SignedContributionAndProof<P>,
    ) -> Result<()> {
        match self
            .gossip_validator
            .validate_contribution_and_proof(&contribution)
        {
            ValidationOutcome::Reject(reason) => Err(Error::GossipRejected { reason }.into()),
            _ => {
                DutyToP2p::PublishContributionAndProof(Box::new(contribution)).send(&self.p2p_tx);
                Ok(())
            }
        }
    }

    /// Submits a batch of sync-committee messages. Messages are routed
    /// against the sync committee that owns their period: the current one or
    /// the next. The result vector preserves the input's length and order.
    pub async fn send_sync_committee_messages(
        &self,
        messages: Vec<SyncCommitteeMessage>,
    ) -> Vec<Result<()>> {
        let head = self.chain.head();

        let current_period = misc::sync_committee_period_at_slot::<P>(head.slot);
        let next_period = current_period + 1;

        let current_committee = self
            .chain
            .sync_committee_at(head, head.slot)
            .ok()
            .flatten();

        let next_period_slot = misc::compute_start_slot_at_epoch::<P>(
            misc::start_of_sync_committee_period::<P>(next_period),
        );

        let next_committee = self
            .chain
            .sync_committee_at(head, next_period_slot)
            .ok()
            .flatten();

        messages
            .into_iter()
            .map(|message| {
                let current_committee = current_committee.clone();
                let next_committee = next_committee.clone();

                async move {
                    self.submit_sync_committee_message(
                        message,
                        current_period,
                        current_committee,
                        next_committee,
                    )
                    .await
                }
            })
            .collect::<FuturesOrdered<_>>()
            .collect()
            .await
    }

    async fn submit_sync_committee_message(
        &self,
        message: SyncCommitteeMessage,
        current_period: u64,
        current_committee: Option<Arc<SyncCommitteeRef>>,
        next_committee: Option<Arc<SyncCommitteeRef>>,
    ) -> Result<()> {
        let period = misc::sync_committee_period_at_slot::<P>(message.slot);
        let next_period = current_period + 1;

        ensure!(
            period == current_period || period == next_period,
            Error::SyncCommitteePeriodMismatch {
                slot: message.slot,
                period,
                current_period,
                next_period,
            },
        );

        let validator_count = self.chain.validator_count();

        ensure!(
            message.validator_index < validator_count,
            Error::ValidatorIndexOutOfRange {
                validator_index: message.validator_index,
                validator_count,
            },
        );

        let committee = if period == current_period {
            current_committee
        } else {
            next_committee
        };

        let committee = committee.ok_or(Error::NotInSyncCommittee {
            validator_index: message.validator_index,
        })?;

        let subnets = committee.subnets_for_validator::<P>(message.validator_index);

        ensure!(
            subnets.any(),
            Error::NotInSyncCommittee {
                validator_index: message.validator_index,
            },
        );

        for (subcommittee_index, in_subnet) in subnets.iter().enumerate() {
            if !in_subnet {
                continue;
            }

            let subcommittee_index = subcommittee_index as SubcommitteeIndex;

            if let ValidationOutcome::Reject(reason) = self
                .gossip_validator
                .validate_sync_committee_message(&message, subcommittee_index)
            {
                return Err(Error::GossipRejected { reason }.into());
            }

            DutyToP2p::PublishSyncCommitteeMessage(Box::new((subcommittee_index, message)))
                .send(&self.p2p_tx);
        }

        Ok(())
    }

    fn attestation_subnet(&self, slot: Slot, committee_index: u64) -> Result<u64> {
        let head = self.chain.head();
        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let epoch_ref = self.chain.get_epoch_ref(head, epoch)?;

        misc::compute_subnet_for_attestation::<P>(
            epoch_ref.committees_at_slot(slot),
            slot,
            committee_index,
        )
    }
}
