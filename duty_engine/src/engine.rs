//! The per-slot duty driver: decides which consensus actions the attached
//! validators owe the network each slot and executes them within the slot's
//! interval schedule.

use core::{cmp::min, marker::PhantomData, time::Duration};
use std::sync::Arc;

use anyhow::Result;
use bls::PublicKeyBytes;
use clock::BeaconClock;
use doppelganger_protection::DoppelgangerProtection;
use futures::{
    channel::mpsc::{UnboundedReceiver, UnboundedSender},
    channel::oneshot::Sender,
    lock::Mutex,
    select,
    StreamExt as _,
};
use helper_functions::{
    misc,
    predicates,
    signing::{RandaoEpoch, SignForSingleFork, SignForSingleForkAtSlot},
};
use itertools::Itertools as _;
use log::{debug, info, warn};
use rand::Rng as _;
use signer::{ForkInfo, Signer, SigningMessage, SigningTriple};
use slashing_protection::{
    Attestation as AttestationRecord, BlockProposal, SlashingProtector,
};
use ssz::{BitList, ContiguousList, SszHash as _};
use static_assertions::const_assert_eq;
use tokio::time::Instant;
use typenum::Unsigned as _;
use types::{
    altair::{
        containers::{ContributionAndProof, SignedContributionAndProof, SyncCommitteeMessage},
        primitives::SubcommitteeIndex,
    },
    combined::{BeaconBlock, SignedBeaconBlock},
    config::Config as ChainConfig,
    nonstandard::Phase,
    phase0::{
        consts::GENESIS_SLOT,
        containers::{
            AggregateAndProof, Attestation, AttestationData, AttesterSlashing,
            BeaconBlock as Phase0BeaconBlock, BeaconBlockBody as Phase0BeaconBlockBody,
            ProposerSlashing, SignedAggregateAndProof, SignedVoluntaryExit,
        },
        primitives::{CommitteeIndex, Epoch, Slot, SubnetId, ValidatorIndex, H256},
    },
    altair::containers::{
        BeaconBlock as AltairBeaconBlock, BeaconBlockBody as AltairBeaconBlockBody,
    },
    bellatrix::containers::{
        BeaconBlock as BellatrixBeaconBlock, BeaconBlockBody as BellatrixBeaconBlockBody,
    },
    preset::Preset,
};

use crate::{
    action_tracker::{ActionTracker, AttestationDuty, SUBNET_SUBSCRIPTION_LEAD_TIME_SLOTS},
    attached_validators::AttachedValidators,
    chain::{BlockRef, ChainView, EpochRef},
    config::DutyEngineConfig,
    dumper::DataDumper,
    error::Error,
    gossip::{GossipValidator, ValidationOutcome},
    messages::{
        BeaconCommitteeSubscription, DutyToP2p, SyncCommitteeSubscription, ToSubnetService,
    },
    metrics::{Metrics, MAX_TRACKED_VALIDATOR_BALANCES},
    payload_provider::PayloadProvider,
    pools::{AttestationPool, SyncCommitteePool},
    slot_head::SlotHead,
};

/// Attestations are published one interval (a third of a slot) in.
const ATTESTATION_SLOT_OFFSET: u32 = 1;
/// Sync-committee messages share the attestation interval.
const SYNC_COMMITTEE_MESSAGE_SLOT_OFFSET: u32 = 1;
/// Aggregates and contributions are published two intervals in.
const AGGREGATE_SLOT_OFFSET: u32 = 2;

// Attestations and sync-committee messages are produced against the same
// head in the same pass. They must share an interval.
const_assert_eq!(ATTESTATION_SLOT_OFFSET, SYNC_COMMITTEE_MESSAGE_SLOT_OFFSET);

/// Extra wait after a block arrives, giving it time to propagate before the
/// attestation vote is cast against it.
const BLOCK_PROPAGATION_DELAY: Duration = Duration::from_millis(1000);

/// Requests from the HTTP API layer. Every variant carries a reply channel.
pub enum ApiToEngine<P: Preset> {
    SendAttestation(Sender<Result<()>>, Box<Attestation<P>>),
    SendAggregateAndProof(Sender<Result<()>>, Box<SignedAggregateAndProof<P>>),
    SendBeaconBlock(Sender<Result<bool>>, Box<SignedBeaconBlock<P>>),
    SendVoluntaryExit(Sender<Result<()>>, Box<SignedVoluntaryExit>),
    SendAttesterSlashing(Sender<Result<()>>, Box<AttesterSlashing<P>>),
    SendProposerSlashing(Sender<Result<()>>, Box<ProposerSlashing>),
    SendSyncCommitteeMessages(Sender<Vec<Result<()>>>, Vec<SyncCommitteeMessage>),
    SendSyncCommitteeContribution(Sender<Result<()>>, Box<SignedContributionAndProof<P>>),
}

pub struct Channels<P: Preset> {
    pub api_to_engine_rx: UnboundedReceiver<ApiToEngine<P>>,
    pub p2p_tx: UnboundedSender<DutyToP2p<P>>,
    pub subnet_service_tx: UnboundedSender<ToSubnetService>,
}

pub struct DutyEngine<P: Preset, C, A, S, E, G> {
    pub(crate) chain_config: Arc<ChainConfig>,
    pub(crate) engine_config: Arc<DutyEngineConfig>,
    pub(crate) chain: Arc<C>,
    pub(crate) attestation_pool: Arc<A>,
    pub(crate) sync_committee_pool: Arc<S>,
    pub(crate) payload_provider: Arc<E>,
    pub(crate) gossip_validator: Arc<G>,
    pub(crate) validators: AttachedValidators,
    pub(crate) slashing_protector: Arc<Mutex<SlashingProtector>>,
    pub(crate) doppelganger_protection: Option<Arc<DoppelgangerProtection>>,
    pub(crate) beacon_clock: BeaconClock,
    pub(crate) action_tracker: ActionTracker,
    pub(crate) p2p_tx: UnboundedSender<DutyToP2p<P>>,
    pub(crate) subnet_service_tx: UnboundedSender<ToSubnetService>,
    api_to_engine_rx: Option<UnboundedReceiver<ApiToEngine<P>>>,
    pub(crate) voluntary_exits: Vec<SignedVoluntaryExit>,
    pub(crate) attester_slashings: Vec<AttesterSlashing<P>>,
    pub(crate) proposer_slashings: Vec<ProposerSlashing>,
    next_graffiti_index: usize,
    started_at_slot: Slot,
    last_slot: Slot,
    pub(crate) metrics: Option<Arc<Metrics>>,
    pub(crate) dumper: Option<Arc<DataDumper>>,
    phantom: PhantomData<P>,
}

pub(crate) struct CommitteeMemberDuty {
    pub public_key: PublicKeyBytes,
    pub validator_index: ValidatorIndex,
    pub committee_index: CommitteeIndex,
    pub committee_size: usize,
    pub position_in_committee: usize,
}

impl<P, C, A, S, E, G> DutyEngine<P, C, A, S, E, G>
where
    P: Preset,
    C: ChainView<P>,
    A: AttestationPool<P>,
    S: SyncCommitteePool<P>,
    E: PayloadProvider<P>,
    G: GossipValidator<P>,
{
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        chain_config: Arc<ChainConfig>,
        engine_config: Arc<DutyEngineConfig>,
        chain: Arc<C>,
        attestation_pool: Arc<A>,
        sync_committee_pool: Arc<S>,
        payload_provider: Arc<E>,
        gossip_validator: Arc<G>,
        validators: AttachedValidators,
        slashing_protector: Arc<Mutex<SlashingProtector>>,
        beacon_clock: BeaconClock,
        metrics: Option<Arc<Metrics>>,
        channels: Channels<P>,
    ) -> Self {
        let Channels {
            api_to_engine_rx,
            p2p_tx,
            subnet_service_tx,
        } = channels;

        let started_at_slot = beacon_clock.current_slot().unwrap_or(GENESIS_SLOT);

        let doppelganger_protection = engine_config.doppelganger_detection.then(|| {
            let protection = Arc::new(DoppelgangerProtection::new());

            protection
                .add_tracked_validators::<P>(validators.public_keys(), started_at_slot);

            protection
        });

        let dumper = engine_config.dump_directory.as_ref().and_then(|directory| {
            match DataDumper::new(directory.clone()) {
                Ok(dumper) => Some(Arc::new(dumper)),
                Err(error) => {
                    warn!("failed to set up the message dump directory: {error}");
                    None
                }
            }
        });

        Self {
            chain_config,
            engine_config,
            chain,
            attestation_pool,
            sync_committee_pool,
            payload_provider,
            gossip_validator,
            validators,
            slashing_protector,
            doppelganger_protection,
            beacon_clock,
            action_tracker: ActionTracker::default(),
            p2p_tx,
            subnet_service_tx,
            api_to_engine_rx: Some(api_to_engine_rx),
            voluntary_exits: vec![],
            attester_slashings: vec![],
            proposer_slashings: vec![],
            next_graffiti_index: 0,
            started_at_slot,
            last_slot: started_at_slot.saturating_sub(1),
            metrics,
            dumper,
            phantom: PhantomData,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut ticks = clock::ticks(&self.chain_config, self.chain.genesis_time())?.fuse();

        let mut api_to_engine_rx = self
            .api_to_engine_rx
            .take()
            .expect("api_to_engine_rx is only taken by run");

        loop {
            select! {
                tick = ticks.select_next_some() => {
                    let tick = tick?;

                    if let Some(metrics) = self.metrics.as_ref() {
                        if let Ok(delay) = tick.delay(&self.chain_config, self.chain.genesis_time()) {
                            metrics.set_tick_delay(tick.kind.as_ref(), delay.as_secs_f64());
                        }
                    }

                    if tick.is_start_of_slot() {
                        let last_slot = self.last_slot;
                        self.on_slot(last_slot, tick.slot).await;
                        self.last_slot = tick.slot;
                    }
                }

                message = api_to_engine_rx.select_next_some() => {
                    self.handle_api_message(message).await;
                }

                complete => break Ok(()),
            }
        }
    }

    async fn handle_api_message(&mut self, message: ApiToEngine<P>) {
        let success = match message {
            ApiToEngine::SendAttestation(sender, attestation) => {
                sender.send(self.send_attestation(*attestation).await).is_ok()
            }
            ApiToEngine::SendAggregateAndProof(sender, aggregate) => sender
                .send(self.send_aggregate_and_proof(*aggregate).await)
                .is_ok(),
            ApiToEngine::SendBeaconBlock(sender, block) => {
                sender.send(self.send_beacon_block(*block).await).is_ok()
            }
            ApiToEngine::SendVoluntaryExit(sender, exit) => {
                sender.send(self.send_voluntary_exit(*exit)).is_ok()
            }
            ApiToEngine::SendAttesterSlashing(sender, slashing) => {
                sender.send(self.send_attester_slashing(*slashing)).is_ok()
            }
            ApiToEngine::SendProposerSlashing(sender, slashing) => {
                sender.send(self.send_proposer_slashing(*slashing)).is_ok()
            }
            ApiToEngine::SendSyncCommitteeMessages(sender, messages) => sender
                .send(self.send_sync_committee_messages(messages).await)
                .is_ok(),
            ApiToEngine::SendSyncCommitteeContribution(sender, contribution) => sender
                .send(self.send_sync_committee_contribution(*contribution))
                .is_ok(),
        };

        if !success {
            debug!("reply to the HTTP API failed because the receiver was dropped");
        }
    }

    /// The slot driver. Best-effort: failures are logged, never propagated,
    /// and a failure in one duty leaves the others running.
    pub async fn on_slot(&mut self, last_slot: Slot, current_slot: Slot) {
        if let Err(error) = self.handle_slot(last_slot, current_slot).await {
            warn!("duties for slot {current_slot} ended early: {error:?}");
        }
    }

    async fn handle_slot(&mut self, last_slot: Slot, current_slot: Slot) -> Result<()> {
        if self.validators.is_empty() {
            return Ok(());
        }

        let head = self.chain.head();

        if head.slot + self.engine_config.sync_horizon < current_slot {
            debug!(
                "{} (next tracked duties: attestation at {:?}, proposal at {:?})",
                Error::NotSynced {
                    head_slot: head.slot,
                    sync_horizon: self.engine_config.sync_horizon,
                    wall_slot: current_slot,
                },
                self.action_tracker.next_attestation_slot(current_slot),
                self.action_tracker.next_proposal_slot(current_slot),
            );

            self.update_validator_metrics();

            return Ok(());
        }

        if let Some(protection) = self.doppelganger_protection.clone() {
            protection.activate_validators_that_pass_checks::<P>(current_slot);

            let broadcast_start_epoch = protection.broadcast_start_epoch::<P>(self.started_at_slot);

            if misc::compute_epoch_at_slot::<P>(current_slot) < broadcast_start_epoch {
                debug!("{}", Error::Doppelganger { broadcast_start_epoch });
                return Ok(());
            }
        }

        self.register_duties(current_slot).await;

        // Catch-up: missed slots get their proposals and attestations in
        // order before the current slot starts.
        let mut head = head;
        let mut slot = last_slot + 1;

        while slot < current_slot {
            head = self.propose(head, slot).await;
            self.attest(head, slot).await;
            slot += 1;
        }

        head = self.propose(head, current_slot).await;

        // Attestation cutoff: wait for the block or a third of the slot,
        // whichever comes first.
        let attestation_deadline =
            self.beacon_clock
                .deadline(current_slot, ATTESTATION_SLOT_OFFSET, Duration::ZERO);

        let expect_block = self.chain.expect_block(current_slot);

        match tokio::time::timeout_at(attestation_deadline, expect_block).await {
            Ok(block) => {
                debug!(
                    "block {:?} arrived in slot {current_slot}; \
                     waiting for it to propagate before attesting",
                    block.root,
                );

                let propagation_deadline = min(
                    Instant::now() + BLOCK_PROPAGATION_DELAY,
                    attestation_deadline + BLOCK_PROPAGATION_DELAY,
                );

                tokio::time::sleep_until(propagation_deadline).await;
            }
            Err(_) => debug!("no block arrived in slot {current_slot} before the cutoff"),
        }

        let head = self.chain.head();

        self.attest(head, current_slot).await;
        self.sync_committee_messages(head, current_slot).await;
        self.update_validator_metrics();

        // Aggregate cutoff: two thirds into the slot. The first slots after
        // genesis have nothing to aggregate.
        if current_slot > 2 {
            let aggregate_deadline =
                self.beacon_clock
                    .deadline(current_slot, AGGREGATE_SLOT_OFFSET, Duration::ZERO);

            tokio::time::sleep_until(aggregate_deadline).await;

            futures::join!(
                self.aggregate(head, current_slot),
                self.sync_committee_contributions(head, current_slot),
            );
        }

        Ok(())
    }

    /// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/phase0/validator.md#block-proposal>
    ///
    /// Returns the post-proposal head: the new block on success, the prior
    /// head otherwise.
    async fn propose(&mut self, head: BlockRef, slot: Slot) -> BlockRef {
        match self.propose_internal(head, slot).await {
            Ok(new_head) => new_head,
            Err(error) => {
                warn!("failed to propose beacon block in slot {slot}: {error:?}");
                head
            }
        }
    }

    async fn propose_internal(&mut self, head: BlockRef, slot: Slot) -> Result<BlockRef> {
        if head.slot >= slot {
            debug!(
                "{}",
                Error::HeadAheadOfSlot {
                    head_slot: head.slot,
                    slot,
                },
            );
            return Ok(head);
        }

        let Some(proposer_index) = self.chain.get_proposer(head, slot)? else {
            return Ok(head);
        };

        let Some(public_key) = self.chain.public_key(proposer_index) else {
            return Ok(head);
        };

        let Some(validator) = self.validators.get(public_key) else {
            return Ok(head);
        };

        validator.set_validator_index(proposer_index);

        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let genesis_validators_root = self.chain.genesis_validators_root();
        let fork_info = self.fork_info(epoch);

        let randao_signing_root = SignForSingleFork::<P>::signing_root(
            &RandaoEpoch::from(epoch),
            &self.chain_config,
            genesis_validators_root,
        );

        let result = self
            .validators
            .signer()
            .load()
            .sign::<P>(
                SigningMessage::RandaoReveal { epoch },
                randao_signing_root,
                Some(fork_info),
                public_key,
            )
            .await;

        let randao_reveal = match result {
            Ok(signature) => signature.to_bytes(),
            Err(error) => {
                warn!(
                    "failed to sign RANDAO reveal \
                     (epoch: {epoch}, public_key: {public_key:?}): {error:?}",
                );
                return Ok(head);
            }
        };

        let graffiti = self.next_graffiti();

        let block = self
            .make_block_for(head, slot, proposer_index, randao_reveal, graffiti)
            .await?;

        let block_root = block.hash_tree_root();

        let signing_root = SignForSingleFork::<P>::signing_root(
            &block,
            &self.chain_config,
            genesis_validators_root,
        );

        // The gate must pass before the signing request reaches a signer.
        let proposal = BlockProposal {
            slot,
            signing_root: Some(signing_root),
        };

        let control_flow = self
            .slashing_protector
            .lock()
            .await
            .validate_and_store_own_block_proposal(proposal, public_key, epoch)?;

        if control_flow.is_break() {
            warn!(
                "{}",
                Error::SlashingProtectionTripped {
                    validator_index: proposer_index,
                },
            );
            return Ok(head);
        }

        let result = self
            .validators
            .signer()
            .load()
            .sign::<P>(
                SigningMessage::from(&block),
                signing_root,
                Some(fork_info),
                public_key,
            )
            .await;

        let signature = match result {
            Ok(signature) => signature,
            Err(error) => {
                warn!("failed to sign beacon block (slot: {slot}): {error:?}");
                return Ok(head);
            }
        };

        let signed_block = Arc::new(block.with_signature(signature.to_bytes()));

        if let ValidationOutcome::Reject(reason) =
            self.gossip_validator.validate_beacon_block(&signed_block)
        {
            warn!("own beacon block failed gossip validation: {reason}");
            return Ok(head);
        }

        info!(
            "validator {proposer_index} proposing beacon block \
             with root {block_root:?} in slot {slot}",
        );

        // Broadcast first so the block propagates while it is being stored.
        DutyToP2p::PublishBeaconBlock(signed_block.clone()).send(&self.p2p_tx);

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.beacon_blocks_proposed.inc();
        }

        if let Some(dumper) = self.dumper.as_ref() {
            dumper.dump_signed_beacon_block(&signed_block, block_root);
        }

        match self.chain.store_block(signed_block).await {
            Ok(true) => Ok(BlockRef {
                slot,
                root: block_root,
            }),
            Ok(false) => {
                warn!("own beacon block for slot {slot} was not accepted by the chain");
                Ok(head)
            }
            Err(error) => {
                warn!("failed to store own beacon block for slot {slot}: {error:?}");
                Ok(head)
            }
        }
    }

    async fn make_block_for(
        &self,
        head: BlockRef,
        slot: Slot,
        proposer_index: ValidatorIndex,
        randao_reveal: bls::SignatureBytes,
        graffiti: H256,
    ) -> Result<BeaconBlock<P>> {
        let eth1_data = self.chain.eth1_vote();

        let deposits = self
            .chain
            .pending_deposits(eth1_data)
            .map_err(|_| Error::Eth1DepositsUnavailable)?;

        let deposits = ContiguousList::try_from_iter(
            deposits.into_iter().take(P::MaxDeposits::USIZE),
        )
        .expect("the call to Iterator::take limits deposits to P::MaxDeposits");

        let attestations = self.attestation_pool.attestations_for_block(slot);
        let proposer_slashings = self.prepare_proposer_slashings_for_proposal();
        let attester_slashings = self.prepare_attester_slashings_for_proposal();
        let voluntary_exits = self.prepare_voluntary_exits_for_proposal();

        let parent_root = head.root;

        // This is a placeholder that is overwritten later using
        // `with_state_root`.
        let state_root = H256::zero();

        let without_state_root = match self.chain_config.phase_at_slot::<P>(slot) {
            Phase::Phase0 => BeaconBlock::from(Phase0BeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root,
                body: Phase0BeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                },
            }),
            Phase::Altair => BeaconBlock::from(AltairBeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root,
                body: AltairBeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                    sync_aggregate: self.sync_aggregate_for_proposal(head, slot),
                },
            }),
            Phase::Bellatrix => BeaconBlock::from(BellatrixBeaconBlock {
                slot,
                proposer_index,
                parent_root,
                state_root,
                body: BellatrixBeaconBlockBody {
                    randao_reveal,
                    eth1_data,
                    graffiti,
                    proposer_slashings,
                    attester_slashings,
                    attestations,
                    deposits,
                    voluntary_exits,
                    sync_aggregate: self.sync_aggregate_for_proposal(head, slot),
                    execution_payload: self
                        .payload_provider
                        .execution_payload(head, slot, proposer_index)?,
                },
            }),
        };

        let state_root = self.chain.post_state_root(head, &without_state_root)?;

        Ok(without_state_root.with_state_root(state_root))
    }

    fn sync_aggregate_for_proposal(
        &self,
        head: BlockRef,
        slot: Slot,
    ) -> types::altair::containers::SyncAggregate<P> {
        // Messages aggregated into a block at `slot` were produced in the
        // previous slot.
        let message_slot = slot.saturating_sub(1).max(GENESIS_SLOT);
        self.sync_committee_pool.sync_aggregate(head.root, message_slot)
    }

    /// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/phase0/validator.md#attesting>
    async fn attest(&self, head: BlockRef, slot: Slot) {
        if let Err(error) = self.attest_internal(head, slot).await {
            warn!("failed to attest in slot {slot}: {error:?}");
        }
    }

    async fn attest_internal(&self, head: BlockRef, slot: Slot) -> Result<()> {
        // An attestation this old can no longer be included in a block.
        if slot + P::SlotsPerEpoch::U64 < head.slot {
            debug!("skipping attestation in slot {slot}: chain has advanced past it");
            return Ok(());
        }

        let slot_head = self.slot_head(head, slot)?;
        let epoch = slot_head.epoch();
        let fork_info = self.fork_info(epoch);

        let mut records = vec![];
        let mut candidates = vec![];

        for member in self.own_committee_members(&slot_head.epoch_ref, slot) {
            let data = slot_head.attestation_data(member.committee_index);
            let signing_root = slot_head.signing_root(&data);

            records.push((
                AttestationRecord {
                    source_epoch: data.source.epoch,
                    target_epoch: data.target.epoch,
                    signing_root: Some(signing_root),
                },
                member.public_key,
            ));

            candidates.push((member, data, signing_root));
        }

        if candidates.is_empty() {
            return Ok(());
        }

        // The gate must pass before any signing request reaches a signer.
        let accepted = {
            let mut protector = self.slashing_protector.lock().await;

            protector.register_validators(records.iter().map(|(_, public_key)| *public_key))?;
            protector.validate_and_store_own_attestations(epoch, records)?
        };

        let accepted_candidates = candidates
            .into_iter()
            .zip(accepted)
            .filter_map(|(candidate, accepted)| accepted.is_some().then_some(candidate))
            .collect_vec();

        if accepted_candidates.is_empty() {
            return Ok(());
        }

        info!(
            "validators [{}] attesting in slot {}",
            accepted_candidates
                .iter()
                .map(|(member, _, _)| member.validator_index)
                .format(", "),
            slot,
        );

        let deadline = self
            .beacon_clock
            .deadline(slot, ATTESTATION_SLOT_OFFSET, Duration::ZERO);

        for (member, data, signing_root) in accepted_candidates {
            let subnet_id = slot_head.subnet_id(slot, member.committee_index)?;

            let signer = self.validators.signer().clone();
            let gossip_validator = self.gossip_validator.clone();
            let p2p_tx = self.p2p_tx.clone();
            let metrics = self.metrics.clone();
            let dumper = self.dumper.clone();

            tokio::spawn(async move {
                let result = publish_singular_attestation(
                    signer,
                    gossip_validator,
                    p2p_tx,
                    metrics,
                    dumper,
                    fork_info,
                    data,
                    signing_root,
                    member,
                    subnet_id,
                    deadline,
                )
                .await;

                if let Err(error) = result {
                    warn!("failed to publish attestation for slot {slot}: {error:?}");
                }
            });
        }

        Ok(())
    }

    /// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/phase0/validator.md#attestation-aggregation>
    async fn aggregate(&self, head: BlockRef, slot: Slot) {
        if let Err(error) = self.aggregate_internal(head, slot).await {
            warn!("failed to aggregate attestations in slot {slot}: {error:?}");
        }
    }

    async fn aggregate_internal(&self, head: BlockRef, slot: Slot) -> Result<()> {
        let slot_head = self.slot_head(head, slot)?;
        let epoch = slot_head.epoch();
        let fork_info = self.fork_info(epoch);
        let genesis_validators_root = self.chain.genesis_validators_root();

        let members = self
            .own_committee_members(&slot_head.epoch_ref, slot)
            .collect_vec();

        if members.is_empty() {
            return Ok(());
        }

        let slot_signing_root =
            SignForSingleFork::<P>::signing_root(&slot, &self.chain_config, genesis_validators_root);

        let triples = members.iter().map(|member| SigningTriple::<P> {
            message: SigningMessage::AggregationSlot { slot },
            signing_root: slot_signing_root,
            public_key: member.public_key,
        });

        let slot_signatures = self
            .validators
            .signer()
            .load()
            .sign_triples(triples, Some(fork_info))
            .await?
            .collect_vec();

        let (triples, proofs): (Vec<_>, Vec<_>) = members
            .iter()
            .zip(slot_signatures)
            .filter_map(|(member, slot_signature)| {
                let selection_proof = slot_signature.to_bytes();

                if !predicates::is_aggregator(member.committee_size, selection_proof) {
                    return None;
                }

                let aggregate_and_proof =
                    self.make_aggregate_and_proof(&slot_head.epoch_ref, slot, member, selection_proof)?;

                let triple = SigningTriple::<P> {
                    message: SigningMessage::AggregateAndProof(Box::new(
                        aggregate_and_proof.clone(),
                    )),
                    signing_root: slot_head.signing_root(&aggregate_and_proof),
                    public_key: member.public_key,
                };

                Some((triple, aggregate_and_proof))
            })
            .unzip();

        if proofs.is_empty() {
            return Ok(());
        }

        let signatures = self
            .validators
            .signer()
            .load()
            .sign_triples(triples, Some(fork_info))
            .await?;

        info!(
            "validators [{}] aggregating in slot {}",
            proofs.iter().map(|proof| proof.aggregator_index).format(", "),
            slot,
        );

        for (signature, message) in signatures.zip(proofs) {
            let aggregate_and_proof = SignedAggregateAndProof {
                message,
                signature: signature.to_bytes(),
            };

            if let ValidationOutcome::Reject(reason) = self
                .gossip_validator
                .validate_aggregate_and_proof(&aggregate_and_proof)
            {
                warn!("own aggregate failed gossip validation: {reason}");
                continue;
            }

            DutyToP2p::PublishAggregateAndProof(Box::new(aggregate_and_proof)).send(&self.p2p_tx);

            if let Some(metrics) = self.metrics.as_ref() {
                metrics.aggregates_published.inc();
            }
        }

        Ok(())
    }

    fn make_aggregate_and_proof(
        &self,
        epoch_ref: &EpochRef<P>,
        slot: Slot,
        member: &CommitteeMemberDuty,
        selection_proof: bls::SignatureBytes,
    ) -> Option<AggregateAndProof<P>> {
        let committee = epoch_ref
            .committee(slot, member.committee_index)
            .expect("member was produced from this committee");

        assert!(
            committee.contains(&member.validator_index),
            "aggregator {} is not a member of committee {} at slot {slot}",
            member.validator_index,
            member.committee_index,
        );

        let aggregate = self
            .attestation_pool
            .aggregated_attestation(slot, member.committee_index)?;

        Some(AggregateAndProof {
            aggregator_index: member.validator_index,
            aggregate,
            selection_proof,
        })
    }

    /// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/altair/validator.md#broadcast-sync-committee-message>
    async fn sync_committee_messages(&self, head: BlockRef, slot: Slot) {
        if let Err(error) = self.sync_committee_messages_internal(head, slot).await {
            warn!("failed to publish sync committee messages in slot {slot}: {error:?}");
        }
    }

    async fn sync_committee_messages_internal(&self, head: BlockRef, slot: Slot) -> Result<()> {
        // The final slot of a period belongs to the committee that owns the
        // next slot's period, so membership is resolved at `slot + 1`.
        let Some(sync_committee) = self.chain.sync_committee_at(head, slot + 1)? else {
            return Ok(());
        };

        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let fork_info = self.fork_info(epoch);
        let genesis_validators_root = self.chain.genesis_validators_root();

        let own_members = sync_committee
            .members
            .iter()
            .copied()
            .unique()
            .filter(|(validator_index, public_key)| {
                let Some(validator) = self.validators.get(*public_key) else {
                    return false;
                };

                validator.set_validator_index(*validator_index);
                true
            })
            .collect_vec();

        for (validator_index, public_key) in own_members {
            let subnets = sync_committee.subnets_for_validator::<P>(validator_index);

            let signing_root = SignForSingleForkAtSlot::<P>::signing_root(
                &head.root,
                &self.chain_config,
                genesis_validators_root,
                slot,
            );

            let signer = self.validators.signer().clone();
            let gossip_validator = self.gossip_validator.clone();
            let p2p_tx = self.p2p_tx.clone();
            let metrics = self.metrics.clone();
            let beacon_block_root = head.root;

            tokio::spawn(async move {
                let result = publish_sync_committee_message(
                    signer,
                    gossip_validator,
                    p2p_tx,
                    metrics,
                    fork_info,
                    slot,
                    beacon_block_root,
                    validator_index,
                    public_key,
                    subnets,
                    signing_root,
                )
                .await;

                if let Err(error) = result {
                    warn!(
                        "failed to publish sync committee message \
                         (slot: {slot}, validator: {validator_index}): {error:?}",
                    );
                }
            });
        }

        Ok(())
    }

    /// <https://github.com/ethereum/consensus-specs/blob/v1.1.1/specs/altair/validator.md#broadcast-sync-committee-contribution>
    async fn sync_committee_contributions(&self, head: BlockRef, slot: Slot) {
        if let Err(error) = self.sync_committee_contributions_internal(head, slot).await {
            warn!("failed to publish sync committee contributions in slot {slot}: {error:?}");
        }
    }

    async fn sync_committee_contributions_internal(
        &self,
        head: BlockRef,
        slot: Slot,
    ) -> Result<()> {
        let Some(sync_committee) = self.chain.sync_committee_at(head, slot + 1)? else {
            return Ok(());
        };

        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let fork_info = self.fork_info(epoch);

        // One selection proof per (subcommittee, member) pair.
        let subcommittee_members = sync_committee
            .members
            .iter()
            .copied()
            .unique()
            .filter(|(_, public_key)| self.validators.get(*public_key).is_some())
            .flat_map(|(validator_index, public_key)| {
                sync_committee
                    .subnets_for_validator::<P>(validator_index)
                    .iter()
                    .enumerate()
                    .filter(|(_, in_subnet)| *in_subnet)
                    .map(|(subcommittee_index, _)| {
                        (subcommittee_index as SubcommitteeIndex, validator_index, public_key)
                    })
                    .collect_vec()
            })
            .collect_vec();

        if subcommittee_members.is_empty() {
            return Ok(());
        }

        let triples = subcommittee_members.iter().map(
            |(subcommittee_index, _, public_key)| {
                let selection_data = types::altair::containers::SyncAggregatorSelectionData {
                    slot,
                    subcommittee_index: *subcommittee_index,
                };

                SigningTriple::<P> {
                    message: SigningMessage::SyncAggregatorSelectionData(selection_data),
                    signing_root: SignForSingleFork::<P>::signing_root(
                        &selection_data,
                        &self.chain_config,
                        self.chain.genesis_validators_root(),
                    ),
                    public_key: *public_key,
                }
            },
        );

        let selection_proofs = self
            .validators
            .signer()
            .load()
            .sign_triples(triples, Some(fork_info))
            .await?
            .collect_vec();

        let (triples, messages): (Vec<_>, Vec<_>) = subcommittee_members
            .iter()
            .zip(selection_proofs)
            .filter_map(|((subcommittee_index, validator_index, public_key), proof)| {
                let selection_proof = proof.to_bytes();

                if !predicates::is_sync_committee_aggregator::<P>(selection_proof) {
                    return None;
                }

                let contribution = self.sync_committee_pool.produce_contribution(
                    slot,
                    head.root,
                    *subcommittee_index,
                )?;

                let contribution_and_proof = ContributionAndProof {
                    aggregator_index: *validator_index,
                    contribution,
                    selection_proof,
                };

                let triple = SigningTriple::<P> {
                    message: SigningMessage::ContributionAndProof(contribution_and_proof.clone()),
                    signing_root: SignForSingleFork::<P>::signing_root(
                        &contribution_and_proof,
                        &self.chain_config,
                        self.chain.genesis_validators_root(),
                    ),
                    public_key: *public_key,
                };

                Some((triple, contribution_and_proof))
            })
            .unzip();

        if messages.is_empty() {
            return Ok(());
        }

        let signatures = self
            .validators
            .signer()
            .load()
            .sign_triples(triples, Some(fork_info))
            .await?;

        for (signature, message) in signatures.zip(messages) {
            let contribution_and_proof = SignedContributionAndProof {
                message,
                signature: signature.to_bytes(),
            };

            if let ValidationOutcome::Reject(reason) = self
                .gossip_validator
                .validate_contribution_and_proof(&contribution_and_proof)
            {
                warn!("own contribution failed gossip validation: {reason}");
                continue;
            }

            debug!(
                "validator {} publishing sync committee contribution and proof: {:?}",
                contribution_and_proof.message.aggregator_index, contribution_and_proof,
            );

            DutyToP2p::PublishContributionAndProof(Box::new(contribution_and_proof))
                .send(&self.p2p_tx);

            if let Some(metrics) = self.metrics.as_ref() {
                metrics.contributions_published.inc();
            }
        }

        Ok(())
    }

    /// Registers duties one lookahead window ahead and fans subscriptions out
    /// to the subnet service.
    async fn register_duties(&mut self, wall_slot: Slot) {
        let head = self.chain.head();
        let mut subscriptions = vec![];

        for slot in wall_slot..wall_slot + SUBNET_SUBSCRIPTION_LEAD_TIME_SLOTS {
            if !self.action_tracker.needs_to_register_at_slot(slot) {
                continue;
            }

            let epoch = misc::compute_epoch_at_slot::<P>(slot);

            let epoch_ref = match self.chain.get_epoch_ref(head, epoch) {
                Ok(epoch_ref) => epoch_ref,
                Err(error) => {
                    debug!("cannot register duties for slot {slot} yet: {error:?}");
                    break;
                }
            };

            if let Ok(Some(proposer_index)) = self.chain.get_proposer(head, slot) {
                let attached = epoch_ref
                    .public_key(proposer_index)
                    .and_then(|public_key| self.validators.get(public_key))
                    .is_some();

                if attached {
                    self.action_tracker.record_proposal_slot(slot);
                }
            }

            let members = self.own_committee_members(&epoch_ref, slot).collect_vec();

            let genesis_validators_root = self.chain.genesis_validators_root();
            let slot_signing_root = SignForSingleFork::<P>::signing_root(
                &slot,
                &self.chain_config,
                genesis_validators_root,
            );

            let triples = members.iter().map(|member| SigningTriple::<P> {
                message: SigningMessage::AggregationSlot { slot },
                signing_root: slot_signing_root,
                public_key: member.public_key,
            });

            let signatures = match self
                .validators
                .signer()
                .load()
                .sign_triples(triples, Some(self.fork_info(epoch)))
                .await
            {
                Ok(signatures) => signatures.collect_vec(),
                Err(error) => {
                    warn!("failed to sign selection proofs for slot {slot}: {error:?}");
                    continue;
                }
            };

            for (member, signature) in members.iter().zip(signatures) {
                let is_aggregator =
                    predicates::is_aggregator(member.committee_size, signature.to_bytes());

                let committees_at_slot = epoch_ref.committees_at_slot(slot);

                let Ok(subnet_id) = misc::compute_subnet_for_attestation::<P>(
                    committees_at_slot,
                    slot,
                    member.committee_index,
                ) else {
                    continue;
                };

                self.action_tracker.record_attestation_duty(AttestationDuty {
                    slot,
                    subnet_id,
                    committee_index: member.committee_index,
                    validator_index: member.validator_index,
                    is_aggregator,
                });

                subscriptions.push(BeaconCommitteeSubscription {
                    validator_index: member.validator_index,
                    committee_index: member.committee_index,
                    committees_at_slot,
                    slot,
                    is_aggregator,
                });
            }

            self.action_tracker.mark_registered(slot);
        }

        if !subscriptions.is_empty() {
            ToSubnetService::UpdateBeaconCommitteeSubscriptions(wall_slot, subscriptions)
                .send(&self.subnet_service_tx);
        }

        self.update_sync_committee_subscriptions(head, wall_slot);

        self.action_tracker.prune(wall_slot);
    }

    fn update_sync_committee_subscriptions(&self, head: BlockRef, wall_slot: Slot) {
        let current_epoch = misc::compute_epoch_at_slot::<P>(wall_slot);
        let current_period = misc::sync_committee_period::<P>(current_epoch);

        let mut subscriptions = vec![];

        if let Ok(Some(sync_committee)) = self.chain.sync_committee_at(head, wall_slot) {
            let until_epoch = misc::start_of_sync_committee_period::<P>(current_period + 1);
            subscriptions.extend(self.own_sync_subscriptions(&sync_committee, until_epoch));
        }

        // From the Altair Honest Validator specification:
        // > To join a sync committee subnet, select a random number of epochs
        // > before the end of the current sync committee period between 1 and
        // > SYNC_COMMITTEE_SUBNET_COUNT, inclusive.
        let next_period_start = misc::start_of_sync_committee_period::<P>(current_period + 1);
        let mut rng = rand::thread_rng();
        let join_epoch = next_period_start.saturating_sub(rng.gen_range(1..=4));

        if current_epoch >= join_epoch {
            let next_period_slot = misc::compute_start_slot_at_epoch::<P>(next_period_start);

            if let Ok(Some(sync_committee)) = self.chain.sync_committee_at(head, next_period_slot) {
                let until_epoch =
                    misc::start_of_sync_committee_period::<P>(current_period + 2);
                subscriptions.extend(self.own_sync_subscriptions(&sync_committee, until_epoch));
            }
        }

        if !subscriptions.is_empty() {
            ToSubnetService::UpdateSyncCommitteeSubscriptions(current_epoch, subscriptions)
                .send(&self.subnet_service_tx);
        }
    }

    fn own_sync_subscriptions(
        &self,
        sync_committee: &crate::chain::SyncCommitteeRef,
        until_epoch: Epoch,
    ) -> Vec<SyncCommitteeSubscription> {
        sync_committee
            .members
            .iter()
            .enumerate()
            .filter(|(_, (_, public_key))| self.validators.get(*public_key).is_some())
            .map(|(position, (validator_index, _))| (*validator_index, position))
            .into_group_map()
            .into_iter()
            .map(
                |(validator_index, sync_committee_indices)| SyncCommitteeSubscription {
                    validator_index,
                    sync_committee_indices,
                    until_epoch,
                },
            )
            .collect()
    }

    fn slot_head(&self, head: BlockRef, slot: Slot) -> Result<SlotHead<P>> {
        let attestation_head = self.chain.block_at_slot(head, slot);
        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let epoch_ref = self.chain.get_epoch_ref(attestation_head, epoch)?;

        Ok(SlotHead {
            config: self.chain_config.clone(),
            head: attestation_head,
            slot,
            epoch_ref,
            genesis_validators_root: self.chain.genesis_validators_root(),
        })
    }

    /// Attached validators among the slot's committees, with their positions.
    /// Backfills validator indices as a side effect of the sighting.
    fn own_committee_members<'engine>(
        &'engine self,
        epoch_ref: &'engine EpochRef<P>,
        slot: Slot,
    ) -> impl Iterator<Item = CommitteeMemberDuty> + 'engine {
        epoch_ref
            .committees(slot)
            .flat_map(move |(committee_index, committee)| {
                let committee_size = committee.len();

                committee
                    .iter()
                    .copied()
                    .enumerate()
                    .filter_map(move |(position_in_committee, validator_index)| {
                        let public_key = epoch_ref.public_key(validator_index)?;
                        let validator = self.validators.get(public_key)?;

                        validator.set_validator_index(validator_index);

                        Some(CommitteeMemberDuty {
                            public_key,
                            validator_index,
                            committee_index,
                            committee_size,
                            position_in_committee,
                        })
                    })
            })
    }

    fn update_validator_metrics(&self) {
        let Some(metrics) = self.metrics.as_ref() else {
            return;
        };

        metrics.attached_validators.set(self.validators.len() as i64);

        // The registry's iteration order is unspecified, so the labelled set
        // is not stable across restarts.
        for (public_key, validator) in self.validators.iter().take(MAX_TRACKED_VALIDATOR_BALANCES) {
            let index = validator
                .validator_index()
                .or_else(|| self.chain.index_of_public_key(*public_key));

            let Some(index) = index else {
                continue;
            };

            validator.set_validator_index(index);

            let Some(balance) = self.chain.validator_balance(index) else {
                continue;
            };

            metrics
                .validator_balances
                .with_label_values(&[&format!("{public_key:?}")])
                .set(balance as f64);
        }
    }

    pub(crate) fn fork_info(&self, epoch: Epoch) -> ForkInfo {
        ForkInfo {
            fork: self.chain_config.fork_at_epoch(epoch),
            genesis_validators_root: self.chain.genesis_validators_root(),
        }
    }

    fn next_graffiti(&mut self) -> H256 {
        if self.engine_config.graffiti.is_empty() {
            return H256::default();
        }

        let index = self.next_graffiti_index;

        self.next_graffiti_index = (index + 1) % self.engine_config.graffiti.len();

        self.engine_config.graffiti[index]
    }

    fn prepare_voluntary_exits_for_proposal(
        &self,
    ) -> ContiguousList<SignedVoluntaryExit, P::MaxVoluntaryExits> {
        ContiguousList::try_from_iter(
            self.voluntary_exits
                .iter()
                .copied()
                .take(P::MaxVoluntaryExits::USIZE),
        )
        .expect("the call to Iterator::take limits exits to P::MaxVoluntaryExits")
    }

    fn prepare_attester_slashings_for_proposal(
        &self,
    ) -> ContiguousList<AttesterSlashing<P>, P::MaxAttesterSlashings> {
        ContiguousList::try_from_iter(
            self.attester_slashings
                .iter()
                .cloned()
                .take(P::MaxAttesterSlashings::USIZE),
        )
        .expect("the call to Iterator::take limits slashings to P::MaxAttesterSlashings")
    }

    fn prepare_proposer_slashings_for_proposal(
        &self,
    ) -> ContiguousList<ProposerSlashing, P::MaxProposerSlashings> {
        ContiguousList::try_from_iter(
            self.proposer_slashings
                .iter()
                .copied()
                .take(P::MaxProposerSlashings::USIZE),
        )
        .expect("the call to Iterator::take limits slashings to P::MaxProposerSlashings")
    }
}

#[allow(clippy::too_many_arguments)]
async fn publish_singular_attestation<P: Preset, G: GossipValidator<P>>(
    signer: Arc<Signer>,
    gossip_validator: Arc<G>,
    p2p_tx: UnboundedSender<DutyToP2p<P>>,
    metrics: Option<Arc<Metrics>>,
    dumper: Option<Arc<DataDumper>>,
    fork_info: ForkInfo,
    data: AttestationData,
    signing_root: H256,
    member: CommitteeMemberDuty,
    subnet_id: SubnetId,
    deadline: Instant,
) -> Result<()> {
    let signature = signer
        .load()
        .sign::<P>(
            SigningMessage::Attestation(data),
            signing_root,
            Some(fork_info),
            member.public_key,
        )
        .await
        .map_err(|error| Error::SignerFailure {
            message: format!("{error}"),
        })?;

    let mut aggregation_bits = BitList::with_length(member.committee_size);
    aggregation_bits.set(member.position_in_committee, true);

    let attestation = Attestation {
        aggregation_bits,
        data,
        signature: signature.to_bytes(),
    };

    if let ValidationOutcome::Reject(reason) = gossip_validator.validate_attestation(&attestation) {
        return Err(Error::GossipRejected { reason }.into());
    }

    let attestation = Arc::new(attestation);

    DutyToP2p::PublishSingularAttestation(attestation.clone(), subnet_id).send(&p2p_tx);

    if let Some(metrics) = &metrics {
        metrics.attestations_published.inc();
        metrics
            .attestation_send_delay_seconds
            .observe(offset_from(deadline));
    }

    if let Some(dumper) = &dumper {
        dumper.dump_own_attestation(&attestation);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn publish_sync_committee_message<P: Preset, G: GossipValidator<P>>(
    signer: Arc<Signer>,
    gossip_validator: Arc<G>,
    p2p_tx: UnboundedSender<DutyToP2p<P>>,
    metrics: Option<Arc<Metrics>>,
    fork_info: ForkInfo,
    slot: Slot,
    beacon_block_root: H256,
    validator_index: ValidatorIndex,
    public_key: PublicKeyBytes,
    subnets: ssz::BitVector<types::altair::consts::SyncCommitteeSubnetCount>,
    signing_root: H256,
) -> Result<()> {
    let signature = signer
        .load()
        .sign::<P>(
            SigningMessage::SyncCommitteeMessage {
                beacon_block_root,
                slot,
            },
            signing_root,
            Some(fork_info),
            public_key,
        )
        .await
        .map_err(|error| Error::SignerFailure {
            message: format!("{error}"),
        })?;

    let message = SyncCommitteeMessage {
        slot,
        beacon_block_root,
        validator_index,
        signature: signature.to_bytes(),
    };

    for (subcommittee_index, in_subnet) in subnets.iter().enumerate() {
        if !in_subnet {
            continue;
        }

        let subcommittee_index = subcommittee_index as SubcommitteeIndex;

        if let ValidationOutcome::Reject(reason) =
            gossip_validator.validate_sync_committee_message(&message, subcommittee_index)
        {
            warn!("own sync committee message failed gossip validation: {reason}");
            continue;
        }

        DutyToP2p::PublishSyncCommitteeMessage(Box::new((subcommittee_index, message)))
            .send(&p2p_tx);

        if let Some(metrics) = &metrics {
            metrics.sync_committee_messages_published.inc();
        }
    }

    Ok(())
}

/// Seconds relative to `deadline`; negative when early.
fn offset_from(deadline: Instant) -> f64 {
    let now = Instant::now();

    if now >= deadline {
        now.saturating_duration_since(deadline).as_secs_f64()
    } else {
        -deadline.saturating_duration_since(now).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex as StdMutex;

    use bls::SecretKey;
    use futures::{
        channel::{mpsc, oneshot},
        future::BoxFuture,
        FutureExt as _,
    };
    use prometheus::Registry;
    use slashing_protection::DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT;
    use ssz::BitVector;
    use types::{
        altair::containers::SyncCommitteeContribution,
        phase0::containers::{Checkpoint, Deposit, Eth1Data},
        preset::Minimal,
    };

    use crate::{chain::SyncCommitteeRef, payload_provider::NullPayloadProvider};

    use super::*;

    type TestEngine = DutyEngine<
        Minimal,
        TestChain,
        TestAttestationPool,
        TestSyncCommitteePool,
        NullPayloadProvider,
        TestGossipValidator,
    >;

    enum BlockArrival {
        Arrived(BlockRef),
        Waiting(Vec<oneshot::Sender<BlockRef>>),
    }

    struct TestChain {
        config: Arc<ChainConfig>,
        genesis_time: u64,
        head: StdMutex<BlockRef>,
        epoch_ref: Arc<EpochRef<Minimal>>,
        sync_committee: Option<Arc<SyncCommitteeRef>>,
        validator_keys: Arc<Vec<PublicKeyBytes>>,
        deposits_available: bool,
        stored_blocks: StdMutex<Vec<Arc<SignedBeaconBlock<Minimal>>>>,
        block_arrivals: StdMutex<HashMap<Slot, BlockArrival>>,
    }

    impl TestChain {
        fn deliver_block(&self, block: BlockRef) {
            *self.head.lock().expect("head lock is not poisoned") = block;

            let mut arrivals = self
                .block_arrivals
                .lock()
                .expect("arrival lock is not poisoned");

            if let Some(BlockArrival::Waiting(senders)) =
                arrivals.insert(block.slot, BlockArrival::Arrived(block))
            {
                for sender in senders {
                    let _ = sender.send(block);
                }
            }
        }
    }

    impl ChainView<Minimal> for TestChain {
        fn head(&self) -> BlockRef {
            *self.head.lock().expect("head lock is not poisoned")
        }

        fn block_at_slot(&self, head: BlockRef, _slot: Slot) -> BlockRef {
            head
        }

        fn expect_block(&self, slot: Slot) -> BoxFuture<'static, BlockRef> {
            let mut arrivals = self
                .block_arrivals
                .lock()
                .expect("arrival lock is not poisoned");

            match arrivals
                .entry(slot)
                .or_insert_with(|| BlockArrival::Waiting(vec![]))
            {
                BlockArrival::Arrived(block) => {
                    let block = *block;
                    async move { block }.boxed()
                }
                BlockArrival::Waiting(senders) => {
                    let (sender, receiver) = oneshot::channel();
                    senders.push(sender);

                    async move {
                        match receiver.await {
                            Ok(block) => block,
                            Err(_) => futures::future::pending().await,
                        }
                    }
                    .boxed()
                }
            }
        }

        fn get_proposer(&self, _head: BlockRef, slot: Slot) -> Result<Option<ValidatorIndex>> {
            Ok(self.epoch_ref.proposer(slot))
        }

        fn get_epoch_ref(&self, _head: BlockRef, _epoch: Epoch) -> Result<Arc<EpochRef<Minimal>>> {
            Ok(self.epoch_ref.clone())
        }

        fn sync_committee_at(
            &self,
            _head: BlockRef,
            slot: Slot,
        ) -> Result<Option<Arc<SyncCommitteeRef>>> {
            if self.config.phase_at_slot::<Minimal>(slot) < Phase::Altair {
                return Ok(None);
            }

            Ok(self.sync_committee.clone())
        }

        fn genesis_validators_root(&self) -> H256 {
            H256::repeat_byte(0x10)
        }

        fn genesis_time(&self) -> u64 {
            self.genesis_time
        }

        fn validator_count(&self) -> u64 {
            self.validator_keys.len() as u64
        }

        fn index_of_public_key(&self, public_key: PublicKeyBytes) -> Option<ValidatorIndex> {
            self.validator_keys
                .iter()
                .position(|key| *key == public_key)
                .map(|position| position as ValidatorIndex)
        }

        fn public_key(&self, validator_index: ValidatorIndex) -> Option<PublicKeyBytes> {
            self.validator_keys.get(validator_index as usize).copied()
        }

        fn validator_balance(&self, _validator_index: ValidatorIndex) -> Option<u64> {
            Some(32_000_000_000)
        }

        fn eth1_vote(&self) -> Eth1Data {
            Eth1Data::default()
        }

        fn pending_deposits(&self, _eth1_data: Eth1Data) -> Result<Vec<Deposit>, crate::Eth1Error> {
            if self.deposits_available {
                Ok(vec![])
            } else {
                Err(crate::Eth1Error::DepositsUnavailable)
            }
        }

        fn post_state_root(
            &self,
            _head: BlockRef,
            _block: &BeaconBlock<Minimal>,
        ) -> Result<H256> {
            Ok(H256::repeat_byte(0xfe))
        }

        fn store_block(
            &self,
            block: Arc<SignedBeaconBlock<Minimal>>,
        ) -> BoxFuture<'_, Result<bool>> {
            async move {
                let block_ref = BlockRef {
                    slot: block.slot(),
                    root: block.message_root(),
                };

                self.stored_blocks
                    .lock()
                    .expect("block lock is not poisoned")
                    .push(block);

                self.deliver_block(block_ref);

                Ok(true)
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct TestAttestationPool {
        aggregate: Option<Attestation<Minimal>>,
    }

    impl AttestationPool<Minimal> for TestAttestationPool {
        fn attestations_for_block(
            &self,
            _slot: Slot,
        ) -> ContiguousList<Attestation<Minimal>, <Minimal as Preset>::MaxAttestations> {
            ContiguousList::default()
        }

        fn aggregated_attestation(
            &self,
            _slot: Slot,
            _committee_index: CommitteeIndex,
        ) -> Option<Attestation<Minimal>> {
            self.aggregate.clone()
        }
    }

    #[derive(Default)]
    struct TestSyncCommitteePool {
        contribution: Option<SyncCommitteeContribution<Minimal>>,
    }

    impl SyncCommitteePool<Minimal> for TestSyncCommitteePool {
        fn sync_aggregate(
            &self,
            _beacon_block_root: H256,
            _slot: Slot,
        ) -> types::altair::containers::SyncAggregate<Minimal> {
            types::altair::containers::SyncAggregate::empty()
        }

        fn produce_contribution(
            &self,
            _slot: Slot,
            _beacon_block_root: H256,
            _subcommittee_index: SubcommitteeIndex,
        ) -> Option<SyncCommitteeContribution<Minimal>> {
            self.contribution.clone()
        }
    }

    #[derive(Default)]
    struct TestGossipValidator {
        reject_attestations: bool,
        reject_blocks: bool,
        attestation_validations: StdMutex<Vec<Instant>>,
    }

    impl GossipValidator<Minimal> for TestGossipValidator {
        fn validate_attestation(&self, _attestation: &Attestation<Minimal>) -> ValidationOutcome {
            self.attestation_validations
                .lock()
                .expect("validation lock is not poisoned")
                .push(Instant::now());

            if self.reject_attestations {
                ValidationOutcome::Reject("attestation rejected by test".to_owned())
            } else {
                ValidationOutcome::Accept
            }
        }

        fn validate_aggregate_and_proof(
            &self,
            _aggregate: &SignedAggregateAndProof<Minimal>,
        ) -> ValidationOutcome {
            ValidationOutcome::Accept
        }

        fn validate_beacon_block(&self, _block: &SignedBeaconBlock<Minimal>) -> ValidationOutcome {
            if self.reject_blocks {
                ValidationOutcome::Reject("block rejected by test".to_owned())
            } else {
                ValidationOutcome::Accept
            }
        }

        fn validate_sync_committee_message(
            &self,
            _message: &SyncCommitteeMessage,
            _subnet_id: u64,
        ) -> ValidationOutcome {
            ValidationOutcome::Ignore
        }

        fn validate_contribution_and_proof(
            &self,
            _contribution: &SignedContributionAndProof<Minimal>,
        ) -> ValidationOutcome {
            ValidationOutcome::Accept
        }

        fn validate_voluntary_exit(&self, _exit: &SignedVoluntaryExit) -> ValidationOutcome {
            ValidationOutcome::Accept
        }

        fn validate_attester_slashing(
            &self,
            _slashing: &AttesterSlashing<Minimal>,
        ) -> ValidationOutcome {
            ValidationOutcome::Accept
        }

        fn validate_proposer_slashing(&self, _slashing: &ProposerSlashing) -> ValidationOutcome {
            ValidationOutcome::Accept
        }
    }

    struct Harness {
        engine: TestEngine,
        chain: Arc<TestChain>,
        gossip_validator: Arc<TestGossipValidator>,
        p2p_rx: mpsc::UnboundedReceiver<DutyToP2p<Minimal>>,
        subnet_rx: mpsc::UnboundedReceiver<ToSubnetService>,
        keys: Vec<PublicKeyBytes>,
        metrics: Arc<Metrics>,
        genesis_instant: Instant,
    }

    struct HarnessOptions {
        config: ChainConfig,
        head: BlockRef,
        committees: BTreeMap<Slot, Vec<Vec<ValidatorIndex>>>,
        proposers: BTreeMap<Slot, ValidatorIndex>,
        attached: Vec<ValidatorIndex>,
        validator_total: u64,
        justified_checkpoint: Checkpoint,
        sync_committee_members: Vec<ValidatorIndex>,
        aggregate: Option<Attestation<Minimal>>,
        contribution: Option<SyncCommitteeContribution<Minimal>>,
        slashing_protector: Option<Arc<Mutex<SlashingProtector>>>,
        graffiti: Vec<H256>,
        deposits_available: bool,
    }

    impl Default for HarnessOptions {
        fn default() -> Self {
            Self {
                config: minimal_with_far_future_forks(),
                head: BlockRef {
                    slot: 0,
                    root: H256::repeat_byte(0xaa),
                },
                committees: BTreeMap::new(),
                proposers: BTreeMap::new(),
                attached: vec![],
                validator_total: 4,
                justified_checkpoint: Checkpoint {
                    epoch: 2,
                    root: H256::repeat_byte(0x09),
                },
                sync_committee_members: vec![],
                aggregate: None,
                contribution: None,
                slashing_protector: None,
                graffiti: vec![],
                deposits_available: true,
            }
        }
    }

    fn minimal_with_far_future_forks() -> ChainConfig {
        ChainConfig::minimal()
    }

    fn minimal_with_altair_at_genesis() -> ChainConfig {
        ChainConfig {
            altair_fork_epoch: 0,
            ..ChainConfig::minimal()
        }
    }

    fn secret_key(index: ValidatorIndex) -> Arc<SecretKey> {
        let mut material = [0x42_u8; 32];
        material[0] = index as u8 + 1;
        Arc::new(SecretKey::key_gen(&material).expect("key material is long enough"))
    }

    fn build_harness(options: HarnessOptions) -> Harness {
        let HarnessOptions {
            config,
            head,
            committees,
            proposers,
            attached,
            validator_total,
            justified_checkpoint,
            sync_committee_members,
            aggregate,
            contribution,
            slashing_protector,
            graffiti,
            deposits_available,
        } = options;

        let config = Arc::new(config);

        let keys = (0..validator_total)
            .map(|index| secret_key(index).to_public_key().to_bytes())
            .collect::<Vec<_>>();

        let validator_keys = Arc::new(keys.clone());

        let epoch_ref = Arc::new(EpochRef::new(
            0,
            justified_checkpoint,
            H256::repeat_byte(0x08),
            committees,
            proposers.into_iter().collect(),
            validator_keys.clone(),
        ));

        let sync_committee = (!sync_committee_members.is_empty()).then(|| {
            Arc::new(SyncCommitteeRef {
                period: 0,
                members: sync_committee_members
                    .iter()
                    .map(|index| (*index, keys[*index as usize]))
                    .collect(),
            })
        });

        let chain = Arc::new(TestChain {
            config: config.clone(),
            genesis_time: 0,
            head: StdMutex::new(head),
            epoch_ref,
            sync_committee,
            validator_keys,
            deposits_available,
            stored_blocks: StdMutex::new(vec![]),
            block_arrivals: StdMutex::new(HashMap::new()),
        });

        let gossip_validator = Arc::new(TestGossipValidator::default());

        let signer = Arc::new(Signer::new([]));
        let mut validators = AttachedValidators::new(signer);

        for index in attached {
            validators.add_local(secret_key(index), |_| Some(index));
        }

        let slashing_protector = slashing_protector.unwrap_or_else(|| {
            Arc::new(Mutex::new(
                SlashingProtector::in_memory(DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT)
                    .expect("in-memory slashing protection store opens"),
            ))
        });

        let genesis_instant = Instant::now();
        let beacon_clock = BeaconClock::anchored_at(&config, genesis_instant);

        let registry = Registry::new();
        let metrics = Arc::new(Metrics::new(&registry).expect("metrics register"));

        let (_api_tx, api_to_engine_rx) = mpsc::unbounded();
        let (p2p_tx, p2p_rx) = mpsc::unbounded();
        let (subnet_service_tx, subnet_rx) = mpsc::unbounded();

        let engine = DutyEngine::new(
            config,
            Arc::new(DutyEngineConfig {
                graffiti,
                ..DutyEngineConfig::default()
            }),
            chain.clone(),
            Arc::new(TestAttestationPool { aggregate }),
            Arc::new(TestSyncCommitteePool { contribution }),
            Arc::new(NullPayloadProvider),
            gossip_validator.clone(),
            validators,
            slashing_protector,
            beacon_clock,
            Some(metrics.clone()),
            Channels {
                api_to_engine_rx,
                p2p_tx,
                subnet_service_tx,
            },
        );

        Harness {
            engine,
            chain,
            gossip_validator,
            p2p_rx,
            subnet_rx,
            keys,
            metrics,
            genesis_instant,
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
        let mut messages = vec![];

        while let Ok(Some(message)) = rx.try_next() {
            messages.push(message);
        }

        messages
    }

    fn attestation_slots(messages: &[DutyToP2p<Minimal>]) -> Vec<Slot> {
        messages
            .iter()
            .filter_map(|message| match message {
                DutyToP2p::PublishSingularAttestation(attestation, _) => {
                    Some(attestation.data.slot)
                }
                _ => None,
            })
            .collect()
    }

    fn count_blocks(messages: &[DutyToP2p<Minimal>]) -> usize {
        messages
            .iter()
            .filter(|message| matches!(message, DutyToP2p::PublishBeaconBlock(_)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn happy_proposal_broadcasts_then_stores_the_block() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0, 1]])]),
            proposers: BTreeMap::from([(100, 0)]),
            attached: vec![0],
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        assert_eq!(count_blocks(&messages), 1);
        assert!(matches!(messages[0], DutyToP2p::PublishBeaconBlock(_)));
        assert_eq!(harness.metrics.beacon_blocks_proposed.get(), 1);

        let stored = harness
            .chain
            .stored_blocks
            .lock()
            .expect("block lock is not poisoned");

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].slot(), 100);
        assert_eq!(stored[0].proposer_index(), 0);

        // The stored block became the head the attestations voted for.
        assert_eq!(harness.chain.head().root, stored[0].message_root());
        assert_eq!(attestation_slots(&messages), vec![100]);
    }

    #[tokio::test(start_paused = true)]
    async fn conflicting_proposal_is_stopped_by_the_slashing_gate() {
        let shared_protector = Arc::new(Mutex::new(
            SlashingProtector::in_memory(DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT)
                .expect("in-memory slashing protection store opens"),
        ));

        let options = || HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            proposers: BTreeMap::from([(100, 0)]),
            attached: vec![0],
            slashing_protector: Some(shared_protector.clone()),
            ..HarnessOptions::default()
        };

        let mut first = build_harness(options());

        let mut second = build_harness(HarnessOptions {
            // A different graffiti produces a different block body and thus a
            // different signing root.
            graffiti: vec![H256::repeat_byte(0x77)],
            ..options()
        });

        first.engine.on_slot(99, 100).await;
        settle().await;

        second.engine.on_slot(99, 100).await;
        settle().await;

        let first_messages = drain(&mut first.p2p_rx);
        let second_messages = drain(&mut second.p2p_rx);

        assert_eq!(count_blocks(&first_messages), 1);
        assert_eq!(count_blocks(&second_messages), 0);
        assert_eq!(second.metrics.beacon_blocks_proposed.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_proposal_replay_is_signed_again() {
        let shared_protector = Arc::new(Mutex::new(
            SlashingProtector::in_memory(DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT)
                .expect("in-memory slashing protection store opens"),
        ));

        let options = || HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            proposers: BTreeMap::from([(100, 0)]),
            attached: vec![0],
            slashing_protector: Some(shared_protector.clone()),
            ..HarnessOptions::default()
        };

        let mut first = build_harness(options());
        let mut second = build_harness(options());

        first.engine.on_slot(99, 100).await;
        settle().await;

        // Identical inputs reproduce a bit-identical signing root, as after a
        // crash and replay.
        second.engine.on_slot(99, 100).await;
        settle().await;

        assert_eq!(count_blocks(&drain(&mut first.p2p_rx)), 1);
        assert_eq!(count_blocks(&drain(&mut second.p2p_rx)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn surround_vote_is_blocked_for_the_offending_validator_only() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 63,
                root: H256::repeat_byte(0xaa),
            },
            // Slot 64 is the start of epoch 8 in the minimal preset.
            committees: BTreeMap::from([(64, vec![vec![0, 1]])]),
            attached: vec![0, 1],
            ..HarnessOptions::default()
        });

        {
            let mut protector = harness.engine.slashing_protector.lock().await;

            protector
                .register_validators(core::iter::once(harness.keys[0]))
                .expect("registering the validator succeeds");

            let record = AttestationRecord {
                source_epoch: 3,
                target_epoch: 7,
                signing_root: Some(H256::repeat_byte(0x0f)),
            };

            let accepted = protector
                .validate_and_store_own_attestations(7, [(record, harness.keys[0])])
                .expect("storing the prior attestation succeeds");

            assert_eq!(accepted.iter().flatten().count(), 1);
        }

        // The new vote has source epoch 2 and target epoch 8, surrounding the
        // stored (3, 7) vote of validator 0.
        harness.engine.on_slot(63, 64).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);
        let attestations = messages
            .iter()
            .filter_map(|message| match message {
                DutyToP2p::PublishSingularAttestation(attestation, _) => Some(attestation),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(attestations.len(), 1);
        // Validator 1 sits at position 1 of committee 0.
        assert_eq!(attestations[0].aggregation_bits.get(0), Some(false));
        assert_eq!(attestations[0].aggregation_bits.get(1), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn catch_up_produces_duties_for_missed_slots_in_order() {
        // Every validator is a member of exactly one committee per epoch, so
        // each catch-up slot gets its own attester.
        let committees = (96..=100)
            .map(|slot| (slot, vec![vec![slot - 96]]))
            .collect::<BTreeMap<_, _>>();

        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 95,
                root: H256::repeat_byte(0xaa),
            },
            committees,
            proposers: BTreeMap::from([(97, 1)]),
            attached: vec![0, 1, 2, 3, 4],
            validator_total: 5,
            aggregate: Some(Attestation {
                aggregation_bits: BitList::with_length(1),
                data: AttestationData::default(),
                signature: bls::AggregateSignatureBytes::empty(),
            }),
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(95, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        assert_eq!(count_blocks(&messages), 1);
        assert_eq!(attestation_slots(&messages), vec![96, 97, 98, 99, 100]);

        // Aggregates never precede attestations of the same slot.
        let last_attestation_position = messages
            .iter()
            .rposition(|message| matches!(message, DutyToP2p::PublishSingularAttestation(..)))
            .expect("attestations were published");

        let first_aggregate_position = messages
            .iter()
            .position(|message| matches!(message, DutyToP2p::PublishAggregateAndProof(_)));

        if let Some(first_aggregate_position) = first_aggregate_position {
            assert!(last_attestation_position < first_aggregate_position);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_block_delays_attestations_by_the_propagation_delay() {
        let config = ChainConfig {
            seconds_per_slot: core::num::NonZeroU64::new(12)
                .expect("12 is nonzero"),
            ..ChainConfig::minimal()
        };

        let mut harness = build_harness(HarnessOptions {
            config,
            head: BlockRef {
                slot: 4,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(5, vec![vec![0]])]),
            attached: vec![0],
            ..HarnessOptions::default()
        });

        // A block for slot 5 arrives 2 seconds into the slot.
        let chain = harness.chain.clone();
        let arrival_instant = harness.genesis_instant + Duration::from_secs(5 * 12 + 2);

        tokio::spawn(async move {
            tokio::time::sleep_until(arrival_instant).await;

            chain.deliver_block(BlockRef {
                slot: 5,
                root: H256::repeat_byte(0xbb),
            });
        });

        harness.engine.on_slot(4, 5).await;
        settle().await;

        let validations = harness
            .gossip_validator
            .attestation_validations
            .lock()
            .expect("validation lock is not poisoned")
            .clone();

        assert_eq!(validations.len(), 1);

        // Arrival at 2 s plus the 1000 ms propagation delay: the attestation
        // goes out 3 seconds into the slot, before the 4-second deadline.
        assert_eq!(
            validations[0],
            harness.genesis_instant + Duration::from_secs(5 * 12 + 3),
        );

        let messages = drain(&mut harness.p2p_rx);

        assert_eq!(attestation_slots(&messages), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_for_one_validator_do_not_affect_others() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0, 1]])]),
            attached: vec![0, 1],
            ..HarnessOptions::default()
        });

        // Validator 1 keeps its handle but loses its signing credentials.
        harness.engine.validators.signer().update(|snapshot| {
            let mut snapshot = snapshot.as_ref().clone();
            snapshot.delete_key(harness.keys[1]);
            snapshot
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);
        let attestations = messages
            .iter()
            .filter_map(|message| match message {
                DutyToP2p::PublishSingularAttestation(attestation, _) => Some(attestation),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(attestations.len(), 1);
        assert_eq!(attestations[0].aggregation_bits.get(0), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn aggregation_is_skipped_in_the_first_slots() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 1,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(2, vec![vec![0]])]),
            attached: vec![0],
            aggregate: Some(Attestation {
                aggregation_bits: BitList::with_length(1),
                data: AttestationData::default(),
                signature: bls::AggregateSignatureBytes::empty(),
            }),
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(1, 2).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        assert_eq!(attestation_slots(&messages), vec![2]);
        assert!(!messages
            .iter()
            .any(|message| matches!(message, DutyToP2p::PublishAggregateAndProof(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_altair_slots_produce_no_sync_committee_messages() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0]])]),
            attached: vec![0],
            sync_committee_members: vec![0],
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        assert!(!messages
            .iter()
            .any(|message| matches!(message, DutyToP2p::PublishSyncCommitteeMessage(_))));
        assert!(!messages
            .iter()
            .any(|message| matches!(message, DutyToP2p::PublishContributionAndProof(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn sync_committee_duties_run_after_altair() {
        let contribution = SyncCommitteeContribution {
            slot: 100,
            beacon_block_root: H256::repeat_byte(0xaa),
            subcommittee_index: 0,
            aggregation_bits: BitVector::default(),
            signature: bls::AggregateSignatureBytes::empty(),
        };

        let mut harness = build_harness(HarnessOptions {
            config: minimal_with_altair_at_genesis(),
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0]])]),
            attached: vec![0],
            sync_committee_members: vec![0],
            contribution: Some(contribution),
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        let first_message_position = messages
            .iter()
            .position(|message| matches!(message, DutyToP2p::PublishSyncCommitteeMessage(_)))
            .expect("sync committee messages were published");

        let first_contribution_position = messages
            .iter()
            .position(|message| matches!(message, DutyToP2p::PublishContributionAndProof(_)))
            .expect("contributions were published");

        // Messages strictly precede contributions for the same slot.
        assert!(first_message_position < first_contribution_position);
        assert!(harness.metrics.sync_committee_messages_published.get() >= 1);
        assert!(harness.metrics.contributions_published.get() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duties_are_registered_one_lookahead_window_ahead() {
        let committees = (100..108)
            .map(|slot| (slot, vec![vec![0, 1]]))
            .collect::<BTreeMap<_, _>>();

        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees,
            proposers: BTreeMap::from([(105, 0)]),
            attached: vec![0],
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.subnet_rx);

        let subscriptions = messages
            .iter()
            .find_map(|message| match message {
                ToSubnetService::UpdateBeaconCommitteeSubscriptions(_, subscriptions) => {
                    Some(subscriptions)
                }
                ToSubnetService::UpdateSyncCommitteeSubscriptions(..) => None,
            })
            .expect("beacon committee subscriptions were sent");

        assert_eq!(subscriptions.len(), 8);

        for subscription in subscriptions {
            assert!((100..108).contains(&subscription.slot));
            assert_eq!(subscription.validator_index, 0);
        }

        assert_eq!(harness.engine.action_tracker.next_attestation_slot(100), Some(100));
        assert_eq!(harness.engine.action_tracker.next_attestation_slot(101), Some(101));
        assert_eq!(harness.engine.action_tracker.next_proposal_slot(100), Some(105));
    }

    #[tokio::test(start_paused = true)]
    async fn not_synced_head_skips_all_duties() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 10,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0]])]),
            proposers: BTreeMap::from([(100, 0)]),
            attached: vec![0],
            ..HarnessOptions::default()
        });

        // 10 + 32 < 100: the head is far behind the wall slot.
        harness.engine.on_slot(99, 100).await;
        settle().await;

        assert!(drain(&mut harness.p2p_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_sync_committee_messages_preserve_order_and_length() {
        let harness = build_harness(HarnessOptions {
            config: minimal_with_altair_at_genesis(),
            head: BlockRef {
                slot: 10,
                root: H256::repeat_byte(0xaa),
            },
            attached: vec![],
            validator_total: 3,
            sync_committee_members: vec![1],
            ..HarnessOptions::default()
        });

        let message = |slot, validator_index| SyncCommitteeMessage {
            slot,
            beacon_block_root: H256::repeat_byte(0xaa),
            validator_index,
            signature: bls::SignatureBytes::empty(),
        };

        let results = harness
            .engine
            .send_sync_committee_messages(vec![
                // In the current period and in the committee.
                message(10, 1),
                // Two periods ahead: minimal has 8 epochs of 8 slots each.
                message(1000, 1),
                // Index out of range.
                message(10, 99),
                // A validator that exists but is not in the committee.
                message(10, 2),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert!(results[3].is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn gossip_rejection_is_returned_to_api_callers() {
        let mut harness = build_harness(HarnessOptions {
            committees: BTreeMap::from([(10, vec![vec![0]])]),
            ..HarnessOptions::default()
        });

        harness.gossip_validator = Arc::new(TestGossipValidator {
            reject_attestations: true,
            ..TestGossipValidator::default()
        });

        harness.engine.gossip_validator = harness.gossip_validator.clone();

        let attestation = Attestation::<Minimal> {
            aggregation_bits: BitList::with_length(1),
            data: AttestationData {
                slot: 10,
                ..AttestationData::default()
            },
            signature: bls::AggregateSignatureBytes::empty(),
        };

        let error = harness
            .engine
            .send_attestation(attestation)
            .await
            .expect_err("gossip validation rejects the attestation");

        assert!(error.to_string().contains("attestation rejected by test"));
        assert!(drain(&mut harness.p2p_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn external_blocks_are_broadcast_and_stored() {
        let mut harness = build_harness(HarnessOptions::default());

        let block = BeaconBlock::<Minimal>::from(Phase0BeaconBlock {
            slot: 7,
            ..Phase0BeaconBlock::default()
        })
        .with_signature(bls::SignatureBytes::empty());

        let accepted = harness
            .engine
            .send_beacon_block(block)
            .await
            .expect("the block passes gossip validation");

        assert!(accepted);

        let messages = drain(&mut harness.p2p_rx);

        assert_eq!(count_blocks(&messages), 1);
        assert_eq!(
            harness
                .chain
                .stored_blocks
                .lock()
                .expect("block lock is not poisoned")
                .len(),
            1,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn eth1_deposit_failure_aborts_only_the_proposal() {
        let mut harness = build_harness(HarnessOptions {
            head: BlockRef {
                slot: 99,
                root: H256::repeat_byte(0xaa),
            },
            committees: BTreeMap::from([(100, vec![vec![0]])]),
            proposers: BTreeMap::from([(100, 0)]),
            attached: vec![0],
            deposits_available: false,
            ..HarnessOptions::default()
        });

        harness.engine.on_slot(99, 100).await;
        settle().await;

        let messages = drain(&mut harness.p2p_rx);

        // No block, but the attestation for the slot still goes out.
        assert_eq!(count_blocks(&messages), 0);
        assert_eq!(attestation_slots(&messages), vec![100]);
        assert_eq!(harness.metrics.beacon_blocks_proposed.get(), 0);
    }
}
