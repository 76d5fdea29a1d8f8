//! Document collection backend

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use super::{validate_batch, DividendStore, StoreBackend};
use crate::db::{Collection, Database, FieldFilter, WriteModel};
use crate::error::{Error, Result};
use crate::models::{Amount, Dividend, DividendId};

const COLLECTION: &str = "dividends";

/// Stored form of a dividend. The amount is kept as decimal text so it never
/// passes through a float.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DividendDocument {
    id: i64,
    user_id: String,
    date: NaiveDate,
    stock: String,
    amount: String,
    #[serde(default, skip_serializing)]
    created_at: Option<i64>,
    #[serde(default, skip_serializing)]
    updated_at: Option<i64>,
}

impl From<&Dividend> for DividendDocument {
    fn from(record: &Dividend) -> Self {
        Self {
            id: record.id.as_i64(),
            user_id: record.user_id.clone(),
            date: record.date,
            stock: record.stock.clone(),
            amount: record.amount.to_string(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl TryFrom<DividendDocument> for Dividend {
    type Error = Error;

    fn try_from(document: DividendDocument) -> Result<Self> {
        let amount = Amount::parse(&document.amount).map_err(|error| {
            Error::Database(format!("document {} has a bad amount: {error}", document.id))
        })?;
        Ok(Self {
            id: DividendId::new(document.id),
            user_id: document.user_id,
            date: document.date,
            stock: document.stock,
            amount,
        })
    }
}

/// Stores one document per dividend in the `dividends` collection.
///
/// A batch becomes one upsert-by-id operation per record, submitted together
/// as a single bulk write. The bulk write is not atomic across records.
pub struct DocumentDividendStore {
    db: Mutex<Database>,
    collection: Collection,
    ready: OnceCell<()>,
}

impl DocumentDividendStore {
    pub fn new(db: Database) -> Result<Self> {
        Ok(Self {
            db: Mutex::new(db),
            collection: Collection::new(COLLECTION)?,
            ready: OnceCell::new(),
        })
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::new(Database::open_in_memory().await?)
    }

    async fn ensure_collection(&self, db: &Database) -> Result<()> {
        self.ready
            .get_or_try_init(|| self.collection.ensure(db.connection(), &["userId"]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DividendStore for DocumentDividendStore {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Dividend>> {
        let db = self.db.lock().await;
        self.ensure_collection(&db).await?;

        let filter = FieldFilter::new("userId", user_id)?;
        let documents = self
            .collection
            .find(db.connection(), &filter, "date")
            .await?;

        documents
            .into_iter()
            .map(|document| {
                let document: DividendDocument = serde_json::from_value(document)?;
                Dividend::try_from(document)
            })
            .collect()
    }

    async fn upsert_batch(&self, records: &[Dividend]) -> Result<()> {
        validate_batch(records)?;
        if records.is_empty() {
            return Ok(());
        }

        let operations = records
            .iter()
            .map(|record| {
                Ok(WriteModel::UpsertOne {
                    id: record.id.as_i64(),
                    document: serde_json::to_value(DividendDocument::from(record))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let db = self.db.lock().await;
        self.ensure_collection(&db).await?;
        let result = self
            .collection
            .bulk_write(db.connection(), operations)
            .await?;
        tracing::debug!(upserted = result.upserted, "Applied dividend bulk write");
        Ok(())
    }

    async fn delete_batch(&self, user_id: &str, ids: &[DividendId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let owner = FieldFilter::new("userId", user_id)?;
        let operations = ids
            .iter()
            .map(|id| WriteModel::DeleteOne {
                id: id.as_i64(),
                filter: Some(owner.clone()),
            })
            .collect();

        let db = self.db.lock().await;
        self.ensure_collection(&db).await?;
        let result = self
            .collection
            .bulk_write(db.connection(), operations)
            .await?;
        Ok(result.deleted)
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use crate::testing::dividend;
    use pretty_assertions::assert_eq;

    async fn setup() -> DocumentDividendStore {
        DocumentDividendStore::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn satisfies_store_contract() {
        let store = setup().await;
        contract::unknown_user_is_empty(&store).await;
        contract::upsert_replaces_and_appends(&store).await;

        contract::upsert_is_idempotent(&setup().await).await;
        contract::users_are_isolated(&setup().await).await;
        contract::invalid_batches_write_nothing(&setup().await).await;
        contract::delete_is_scoped_to_owner(&setup().await).await;
        contract::empty_batch_is_a_no_op(&setup().await).await;
        contract::large_amounts_keep_every_digit(&setup().await).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn documents_carry_timestamps_and_decimal_text() {
        let store = setup().await;
        store
            .upsert_batch(&[dividend(1, "u1", "2024-01-01", "AAPL", "12.50")])
            .await
            .unwrap();

        let db = store.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT body FROM dividends WHERE id = 1", ())
            .await
            .unwrap();
        let body: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        let document: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(document["amount"], serde_json::json!("12.50"));
        assert_eq!(document["userId"], serde_json::json!("u1"));
        assert!(document["createdAt"].is_i64());
        assert!(document["updatedAt"].is_i64());
    }
}
