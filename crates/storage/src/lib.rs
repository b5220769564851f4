//! Channel record storage.
//!
//! [`ChannelStore`] is the persistence boundary of the channel protocol. The
//! last successful [`put`](ChannelStore::put) for a channel is what the next
//! [`get`](ChannelStore::get) returns; there is no caching layer on top.
//!
//! Backends serialize through the [`Encode`]/[`Decode`] (keys) and
//! [`Compress`]/[`Decompress`] (values) codec traits.

mod codec;
mod error;
mod memory;
mod store;

pub use codec::{Compress, Decode, Decompress, Encode};
pub use error::{DatabaseError, StoreError};
pub use memory::MemoryChannelStore;
pub use store::ChannelStore;
