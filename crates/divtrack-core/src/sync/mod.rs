//! Client-side synchronization with the dividends endpoint

mod client;
mod store;

pub use client::{DividendsApiClient, DividendsRemote, SyncError, SyncResult};
pub use store::{CacheOrigin, CacheSnapshot, SyncStore};
