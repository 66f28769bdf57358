pub use crate::{
    action_tracker::{ActionTracker, AttestationDuty, SUBNET_SUBSCRIPTION_LEAD_TIME_SLOTS},
    attached_validators::{AttachedValidator, AttachedValidators, KeystoreDescriptor},
    chain::{BlockRef, ChainView, EpochRef, Eth1Error, SyncCommitteeRef},
    config::DutyEngineConfig,
    engine::{ApiToEngine, Channels, DutyEngine},
    error::Error,
    gossip::{GossipValidator, ValidationOutcome},
    messages::{
        BeaconCommitteeSubscription, DutyToP2p, SyncCommitteeSubscription, ToSubnetService,
    },
    metrics::Metrics,
    payload_provider::{NullPayloadProvider, PayloadProvider},
    pools::{AttestationPool, SyncCommitteePool},
};

mod action_tracker;
mod api;
mod attached_validators;
mod chain;
mod config;
mod dumper;
mod engine;
mod error;
mod gossip;
mod messages;
mod metrics;
mod payload_provider;
mod pools;
mod slot_head;
