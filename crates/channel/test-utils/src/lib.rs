//! Test utilities for Duet channel crates.
//!
//! - [`MockArbiter`] - in-memory arbiter enforcing the on-chain rules
//! - [`RecordingPeerLink`] - captures outbound messages for inspection
//! - [`MailboxNetwork`] - routes messages between registered parties
//! - [`TestParty`] - a random identity with its keyring

mod arbiter;
mod party;
mod peer;

pub use arbiter::{ArbiterCalls, MockArbiter};
pub use party::TestParty;
pub use peer::{MailboxNetwork, RecordingPeerLink};
