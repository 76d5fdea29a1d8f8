//! Shared client state types.

/// Sync status of the client cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// No identity; nothing to sync
    Offline,
    /// A load or save is in flight
    Syncing,
    /// The last load or save succeeded
    Synced,
    /// The last load or save failed
    Error,
}
