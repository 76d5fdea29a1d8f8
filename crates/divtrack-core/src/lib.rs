//! divtrack-core - Core library for divtrack
//!
//! This crate contains the dividend model, the merge rules, the record store
//! backends, and the client-side sync cache shared by the API server and the
//! CLI.

pub mod db;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
pub use models::{Amount, Dividend, DividendId};
pub use state::SyncState;
pub use store::{open_store, DividendStore, StoreBackend, StoreConfig};
