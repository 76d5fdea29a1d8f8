//! libSQL plumbing shared by the database-backed stores

mod collection;
mod connection;
pub(crate) mod migrations;

pub use collection::{BulkWriteResult, Collection, FieldFilter, WriteModel};
pub use connection::{Database, DatabaseTarget};
