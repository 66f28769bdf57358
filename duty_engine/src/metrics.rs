use anyhow::Result;
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry,
};

/// At most this many validators get individually labelled balance gauges.
/// Registry iteration order is unspecified, so the labelled set is not stable
/// across restarts; nothing may depend on its identity.
pub const MAX_TRACKED_VALIDATOR_BALANCES: usize = 64;

pub struct Metrics {
    pub beacon_blocks_proposed: IntCounter,
    pub attestations_published: IntCounter,
    pub aggregates_published: IntCounter,
    pub sync_committee_messages_published: IntCounter,
    pub contributions_published: IntCounter,
    /// Seconds relative to the attestation deadline; negative means early.
    pub attestation_send_delay_seconds: Histogram,
    pub tick_delay_seconds: GaugeVec,
    pub validator_balances: GaugeVec,
    pub attached_validators: IntGauge,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let beacon_blocks_proposed = IntCounter::new(
            "beacon_blocks_proposed",
            "Number of beacon blocks signed and broadcast",
        )?;

        let attestations_published = IntCounter::new(
            "validator_attestations_published",
            "Number of singular attestations signed and broadcast",
        )?;

        let aggregates_published = IntCounter::new(
            "validator_aggregates_published",
            "Number of aggregate and proof messages signed and broadcast",
        )?;

        let sync_committee_messages_published = IntCounter::new(
            "validator_sync_committee_messages_published",
            "Number of sync committee messages signed and broadcast",
        )?;

        let contributions_published = IntCounter::new(
            "validator_contributions_published",
            "Number of sync committee contributions signed and broadcast",
        )?;

        let attestation_send_delay_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "validator_attestation_send_delay_seconds",
                "Offset of attestation broadcasts relative to the deadline",
            )
            .buckets(vec![-1.0, -0.5, -0.25, 0.0, 0.25, 0.5, 1.0, 2.0, 4.0]),
        )?;

        let tick_delay_seconds = GaugeVec::new(
            Opts::new("tick_delay_seconds", "Lateness of clock ticks"),
            &["tick"],
        )?;

        let validator_balances = GaugeVec::new(
            Opts::new("validator_balance_gwei", "Balances of attached validators"),
            &["pubkey"],
        )?;

        let attached_validators = IntGauge::new(
            "validator_attached_total",
            "Number of validators attached to this node",
        )?;

        registry.register(Box::new(beacon_blocks_proposed.clone()))?;
        registry.register(Box::new(attestations_published.clone()))?;
        registry.register(Box::new(aggregates_published.clone()))?;
        registry.register(Box::new(sync_committee_messages_published.clone()))?;
        registry.register(Box::new(contributions_published.clone()))?;
        registry.register(Box::new(attestation_send_delay_seconds.clone()))?;
        registry.register(Box::new(tick_delay_seconds.clone()))?;
        registry.register(Box::new(validator_balances.clone()))?;
        registry.register(Box::new(attached_validators.clone()))?;

        Ok(Self {
            beacon_blocks_proposed,
            attestations_published,
            aggregates_published,
            sync_committee_messages_published,
            contributions_published,
            attestation_send_delay_seconds,
            tick_delay_seconds,
            validator_balances,
            attached_validators,
        })
    }

    pub fn set_tick_delay(&self, tick: &str, seconds: f64) {
        self.tick_delay_seconds.with_label_values(&[tick]).set(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_collisions() -> Result<()> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry)?;

        metrics.beacon_blocks_proposed.inc();
        metrics.attestation_send_delay_seconds.observe(-0.3);
        metrics.set_tick_delay("Propose", 0.01);

        assert_eq!(metrics.beacon_blocks_proposed.get(), 1);

        Ok(())
    }
}
