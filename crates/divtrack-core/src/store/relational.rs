//! Relational table backend

use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::{Connection, Row};
use tokio::sync::{Mutex, OnceCell};

use super::{validate_batch, DividendStore, StoreBackend};
use crate::db::{migrations, Database};
use crate::error::{Error, Result};
use crate::models::{Amount, Dividend, DividendId};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stores dividends in the `dividends` table, amounts as integer cents.
///
/// Each record of a batch is its own `INSERT ... ON CONFLICT` statement, all
/// inside one transaction: a batch is applied whole or not at all.
pub struct RelationalDividendStore {
    db: Mutex<Database>,
    schema: OnceCell<()>,
}

impl RelationalDividendStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            schema: OnceCell::new(),
        }
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    async fn ensure_schema(&self, conn: &Connection) -> Result<()> {
        self.schema
            .get_or_try_init(|| migrations::run(conn))
            .await?;
        Ok(())
    }

    async fn upsert_one(conn: &Connection, record: &Dividend, now: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO dividends (id, userId, date, stock, amount, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 userId = excluded.userId,
                 date = excluded.date,
                 stock = excluded.stock,
                 amount = excluded.amount,
                 updated_at = excluded.updated_at",
            libsql::params![
                record.id.as_i64(),
                record.user_id.clone(),
                record.date.format(DATE_FORMAT).to_string(),
                record.stock.clone(),
                record.amount.to_minor_units()?,
                now
            ],
        )
        .await?;
        Ok(())
    }

    fn parse_dividend(row: &Row) -> Result<Dividend> {
        let date: String = row.get(2)?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|error| Error::Database(format!("invalid stored date `{date}`: {error}")))?;
        Ok(Dividend {
            id: DividendId::new(row.get(0)?),
            user_id: row.get(1)?,
            date,
            stock: row.get(3)?,
            amount: Amount::from_minor_units(row.get(4)?),
        })
    }
}

#[async_trait]
impl DividendStore for RelationalDividendStore {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Dividend>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        self.ensure_schema(conn).await?;

        let mut rows = conn
            .query(
                "SELECT id, userId, date, stock, amount
                 FROM dividends
                 WHERE userId = ?1
                 ORDER BY date DESC, id DESC",
                [user_id],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_dividend(&row)?);
        }
        Ok(records)
    }

    async fn upsert_batch(&self, records: &[Dividend]) -> Result<()> {
        validate_batch(records)?;
        if records.is_empty() {
            return Ok(());
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        self.ensure_schema(conn).await?;

        let now = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction().await?;
        for record in records {
            if let Err(error) = Self::upsert_one(&tx, record, now).await {
                tracing::warn!(
                    id = %record.id,
                    total = records.len(),
                    "Relational upsert failed, rolling back batch"
                );
                tx.rollback().await?;
                return Err(error);
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_batch(&self, user_id: &str, ids: &[DividendId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        self.ensure_schema(conn).await?;

        let mut removed = 0u64;
        for id in ids {
            removed += conn
                .execute(
                    "DELETE FROM dividends WHERE id = ?1 AND userId = ?2",
                    libsql::params![id.as_i64(), user_id.to_string()],
                )
                .await?;
        }
        usize::try_from(removed).map_err(|error| Error::Database(error.to_string()))
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Relational
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use crate::testing::dividend;
    use pretty_assertions::assert_eq;

    async fn setup() -> RelationalDividendStore {
        RelationalDividendStore::open_in_memory().await.unwrap()
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
    async fn failed_batch_is_rolled_back() {
        let store = setup().await;
        assert!(store.list_by_user("u1").await.unwrap().is_empty());
        {
            let db = store.db.lock().await;
            db.connection()
                .execute(
                    "CREATE TRIGGER reject_halted BEFORE INSERT ON dividends
                     WHEN NEW.stock = 'HALTED'
                     BEGIN SELECT RAISE(ABORT, 'trading halted'); END",
                    (),
                )
                .await
                .unwrap();
        }

        let err = store
            .upsert_batch(&[
                dividend(1, "u1", "2024-01-01", "AAPL", "1.00"),
                dividend(2, "u1", "2024-01-02", "HALTED", "2.00"),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert!(store.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn amounts_are_stored_as_cents() {
        let store = setup().await;
        store
            .upsert_batch(&[dividend(1, "u1", "2024-01-01", "AAPL", "12.34")])
            .await
            .unwrap();

        let db = store.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT amount, typeof(amount) FROM dividends WHERE id = 1", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1234);
        assert_eq!(row.get::<String>(1).unwrap(), "integer");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replacing_keeps_created_at() {
        let store = setup().await;
        store
            .upsert_batch(&[dividend(1, "u1", "2024-01-01", "AAPL", "1.00")])
            .await
            .unwrap();
        {
            let db = store.db.lock().await;
            db.connection()
                .execute("UPDATE dividends SET created_at = 7", ())
                .await
                .unwrap();
        }
        store
            .upsert_batch(&[dividend(1, "u1", "2024-01-01", "AAPL", "2.00")])
            .await
            .unwrap();

        let db = store.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT created_at, updated_at FROM dividends WHERE id = 1", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 7);
        assert!(row.get::<i64>(1).unwrap() > 7);
    }
}
