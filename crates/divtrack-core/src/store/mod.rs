//! Record stores: one contract, three persistence backends

mod document;
mod file;
mod relational;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{Database, DatabaseTarget};
use crate::error::{Error, Result};
use crate::models::{Dividend, DividendId};

pub use document::DocumentDividendStore;
pub use file::FileDividendStore;
pub use relational::RelationalDividendStore;

/// Default location of the file backend's JSON document
pub const DEFAULT_FILE_PATH: &str = "data/dividends.json";

/// Persistence contract shared by every backend.
///
/// Implementations create their backing structure lazily on first use and
/// list records newest date first.
#[async_trait]
pub trait DividendStore: Send + Sync {
    /// All records owned by `user_id`; empty when there are none
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Dividend>>;

    /// Insert each record whose id is new, fully replace the rest
    async fn upsert_batch(&self, records: &[Dividend]) -> Result<()>;

    /// Remove the given ids owned by `user_id`, returning how many went away
    async fn delete_batch(&self, user_id: &str, ids: &[DividendId]) -> Result<usize>;

    fn backend(&self) -> StoreBackend;
}

/// Reject a batch before anything is written if any record is invalid
pub fn validate_batch(records: &[Dividend]) -> Result<()> {
    records.iter().try_for_each(Dividend::validate)
}

/// The available persistence backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Pretty-printed JSON array on local disk
    #[default]
    File,
    /// One JSON document per dividend
    Document,
    /// A `dividends` table
    Relational,
}

impl StoreBackend {
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Document => "document",
            Self::Relational => "relational",
        }
    }

    pub const fn needs_database(self) -> bool {
        matches!(self, Self::Document | Self::Relational)
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "document" | "mongo" => Ok(Self::Document),
            "relational" | "sql" => Ok(Self::Relational),
            other => Err(Error::InvalidInput(format!(
                "unknown store backend `{other}` (expected file, document, or relational)"
            ))),
        }
    }
}

/// Everything needed to construct a store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub file_path: PathBuf,
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            file_path: PathBuf::from(DEFAULT_FILE_PATH),
            database_url: None,
            auth_token: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("file_path", &self.file_path)
            .field("database_url", &self.database_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Construct the store selected by `config`
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DividendStore>> {
    let store: Arc<dyn DividendStore> = match config.backend {
        StoreBackend::File => Arc::new(FileDividendStore::new(&config.file_path)),
        StoreBackend::Document => {
            Arc::new(DocumentDividendStore::new(open_database(config).await?)?)
        }
        StoreBackend::Relational => {
            Arc::new(RelationalDividendStore::new(open_database(config).await?))
        }
    };
    tracing::info!(backend = %config.backend, "Opened dividend store");
    Ok(store)
}

async fn open_database(config: &StoreConfig) -> Result<Database> {
    let url = config.database_url.as_deref().ok_or_else(|| {
        Error::InvalidInput(format!(
            "a database URL is required for the {} backend",
            config.backend
        ))
    })?;
    let target = DatabaseTarget::parse(url, config.auth_token.as_deref())?;
    Database::open_target(&target).await
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every backend must share

    use super::DividendStore;
    use crate::models::DividendId;
    use crate::testing::dividend;
    use pretty_assertions::assert_eq;

    pub async fn unknown_user_is_empty(store: &dyn DividendStore) {
        assert!(store.list_by_user("nobody").await.unwrap().is_empty());
    }

    pub async fn upsert_replaces_and_appends(store: &dyn DividendStore) {
        store
            .upsert_batch(&[dividend(1, "u1", "2024-01-01", "AAPL", "12.50")])
            .await
            .unwrap();
        store
            .upsert_batch(&[
                dividend(1, "u1", "2024-01-01", "AAPL", "15.00"),
                dividend(2, "u1", "2024-02-01", "MSFT", "8.25"),
            ])
            .await
            .unwrap();

        let listed = store.list_by_user("u1").await.unwrap();
        assert_eq!(
            listed,
            vec![
                dividend(2, "u1", "2024-02-01", "MSFT", "8.25"),
                dividend(1, "u1", "2024-01-01", "AAPL", "15.00"),
            ]
        );
    }

    pub async fn upsert_is_idempotent(store: &dyn DividendStore) {
        let batch = [
            dividend(10, "u1", "2024-05-01", "KO", "0.46"),
            dividend(11, "u1", "2024-04-01", "PEP", "1.27"),
        ];
        store.upsert_batch(&batch).await.unwrap();
        let once = store.list_by_user("u1").await.unwrap();
        store.upsert_batch(&batch).await.unwrap();
        let twice = store.list_by_user("u1").await.unwrap();
        assert_eq!(twice, once);
        assert_eq!(twice.len(), 2);
    }

    pub async fn users_are_isolated(store: &dyn DividendStore) {
        store
            .upsert_batch(&[
                dividend(1, "u1", "2024-01-01", "AAPL", "1.00"),
                dividend(2, "u2", "2024-01-02", "MSFT", "2.00"),
                dividend(3, "u1", "2024-01-03", "T", "3.00"),
            ])
            .await
            .unwrap();

        let u1 = store.list_by_user("u1").await.unwrap();
        let u2 = store.list_by_user("u2").await.unwrap();
        assert!(u1.iter().all(|d| d.user_id == "u1"));
        assert_eq!(u1.len(), 2);
        assert_eq!(u2, vec![dividend(2, "u2", "2024-01-02", "MSFT", "2.00")]);
    }

    pub async fn invalid_batches_write_nothing(store: &dyn DividendStore) {
        let err = store
            .upsert_batch(&[
                dividend(1, "u1", "2024-01-01", "AAPL", "1.00"),
                dividend(2, " ", "2024-01-01", "MSFT", "1.00"),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert!(store.list_by_user("u1").await.unwrap().is_empty());
    }

    pub async fn delete_is_scoped_to_owner(store: &dyn DividendStore) {
        store
            .upsert_batch(&[
                dividend(1, "u1", "2024-01-01", "AAPL", "1.00"),
                dividend(2, "u2", "2024-01-01", "MSFT", "1.00"),
            ])
            .await
            .unwrap();

        let removed = store
            .delete_batch("u1", &[DividendId::new(1), DividendId::new(2)])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_by_user("u1").await.unwrap().is_empty());
        assert_eq!(store.list_by_user("u2").await.unwrap().len(), 1);
    }

    pub async fn large_amounts_keep_every_digit(store: &dyn DividendStore) {
        let batch = [
            dividend(1, "u1", "2024-01-01", "BRK", "12345678901234567.89"),
            dividend(2, "u1", "2024-01-02", "BRK", "92233720368547758.07"),
            dividend(3, "u1", "2024-01-03", "BRK", "-0.01"),
        ];
        store.upsert_batch(&batch).await.unwrap();

        let listed = store.list_by_user("u1").await.unwrap();
        let amounts: Vec<String> = listed.iter().map(|d| d.amount.to_string()).collect();
        assert_eq!(
            amounts,
            vec!["-0.01", "92233720368547758.07", "12345678901234567.89"]
        );
    }

    pub async fn empty_batch_is_a_no_op(store: &dyn DividendStore) {
        store.upsert_batch(&[]).await.unwrap();
        assert_eq!(store.delete_batch("u1", &[]).await.unwrap(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("file".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert_eq!(
            " Document ".parse::<StoreBackend>().unwrap(),
            StoreBackend::Document
        );
        assert_eq!(
            "sql".parse::<StoreBackend>().unwrap(),
            StoreBackend::Relational
        );
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = StoreConfig {
            backend: StoreBackend::Relational,
            database_url: Some("libsql://db.turso.io".into()),
            auth_token: Some("sensitive-token".into()),
            ..StoreConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sensitive-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_store_requires_url_for_database_backends() {
        let config = StoreConfig {
            backend: StoreBackend::Document,
            ..StoreConfig::default()
        };
        let err = open_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("database URL"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_store_builds_each_backend() {
        let tmp = tempdir().unwrap();
        for backend in [
            StoreBackend::File,
            StoreBackend::Document,
            StoreBackend::Relational,
        ] {
            let config = StoreConfig {
                backend,
                file_path: tmp.path().join("dividends.json"),
                database_url: Some(":memory:".into()),
                auth_token: None,
            };
            let store = open_store(&config).await.unwrap();
            assert_eq!(store.backend(), backend);
            assert!(store.list_by_user("u1").await.unwrap().is_empty());
        }
    }
}
