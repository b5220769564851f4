//! Protocol configuration.

use std::time::Duration;

use crate::constants::*;

/// What the channel protocol needs to know about its environment.
#[auto_impl::auto_impl(&, Arc)]
pub trait ProtocolConfig: Send + Sync {
    /// Bound on a single arbiter or peer round trip.
    fn request_timeout(&self) -> Duration;

    /// Retries after a transient arbiter failure, not counting the first try.
    fn arbiter_retry_attempts(&self) -> u32;

    /// Delay before the first arbiter retry.
    fn arbiter_retry_initial_backoff(&self) -> Duration;

    /// Cap on the delay between arbiter retries.
    fn arbiter_retry_max_backoff(&self) -> Duration;

    /// Smallest challenge period, in blocks, the protocol will open or accept.
    fn min_challenge_period(&self) -> u64;
}

/// Built-in defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProtocolConfig;

impl ProtocolConfig for DefaultProtocolConfig {
    fn request_timeout(&self) -> Duration {
        Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
    }

    fn arbiter_retry_attempts(&self) -> u32 {
        DEFAULT_ARBITER_RETRY_ATTEMPTS
    }

    fn arbiter_retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(DEFAULT_ARBITER_RETRY_INITIAL_BACKOFF_MS)
    }

    fn arbiter_retry_max_backoff(&self) -> Duration {
        Duration::from_millis(DEFAULT_ARBITER_RETRY_MAX_BACKOFF_MS)
    }

    fn min_challenge_period(&self) -> u64 {
        DEFAULT_MIN_CHALLENGE_PERIOD
    }
}
