//! Default constants for the channel protocol.

/// Default bound on a single arbiter or peer round trip, in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default number of retries after a transient arbiter failure.
pub(crate) const DEFAULT_ARBITER_RETRY_ATTEMPTS: u32 = 3;

/// Default delay before the first arbiter retry, in milliseconds.
pub(crate) const DEFAULT_ARBITER_RETRY_INITIAL_BACKOFF_MS: u64 = 250;

/// Default cap on the delay between arbiter retries, in milliseconds.
pub(crate) const DEFAULT_ARBITER_RETRY_MAX_BACKOFF_MS: u64 = 5_000;

/// Default minimum challenge period, in blocks. A zero-block period would let
/// a unilateral exit finalize before the counterparty can respond.
pub(crate) const DEFAULT_MIN_CHALLENGE_PERIOD: u64 = 1;
