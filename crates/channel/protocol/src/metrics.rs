//! Channel protocol metrics.

use metrics::Counter;

/// Channel protocol metrics
#[derive(Clone, Debug)]
pub struct ChannelProtocolMetrics {
    /// Channels proposed by the local party
    pub(crate) proposed_total: Counter,
    /// Channels that reached `Open` locally
    pub(crate) opened_total: Counter,
    /// Updates that became dual-signed
    pub(crate) updates_accepted_total: Counter,
    /// Updates recorded by the arbiter
    pub(crate) updates_posted_total: Counter,
    /// Challenge periods started by the local party
    pub(crate) challenges_started_total: Counter,
    /// Inbound messages that failed signature verification
    pub(crate) fraud_suspected_total: Counter,
    /// Arbiter calls retried after a transient failure
    pub(crate) arbiter_retries_total: Counter,
}

impl Default for ChannelProtocolMetrics {
    fn default() -> Self {
        Self {
            proposed_total: metrics::counter!("channel.proposed_total"),
            opened_total: metrics::counter!("channel.opened_total"),
            updates_accepted_total: metrics::counter!("channel.updates_accepted_total"),
            updates_posted_total: metrics::counter!("channel.updates_posted_total"),
            challenges_started_total: metrics::counter!("channel.challenges_started_total"),
            fraud_suspected_total: metrics::counter!("channel.fraud_suspected_total"),
            arbiter_retries_total: metrics::counter!("channel.arbiter_retries_total"),
        }
    }
}
