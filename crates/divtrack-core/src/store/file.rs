//! JSON file backend

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{validate_batch, DividendStore, StoreBackend};
use crate::error::Result;
use crate::merge::{merge, remove_ids, sort_for_listing};
use crate::models::{as_text, Amount, Dividend, DividendId};

/// On-disk form of a dividend. The amount is written as decimal text; numeric
/// amounts in older files still load.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDividend {
    id: DividendId,
    user_id: String,
    date: NaiveDate,
    stock: String,
    #[serde(with = "as_text")]
    amount: Amount,
}

impl From<&Dividend> for StoredDividend {
    fn from(record: &Dividend) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id.clone(),
            date: record.date,
            stock: record.stock.clone(),
            amount: record.amount,
        }
    }
}

impl From<StoredDividend> for Dividend {
    fn from(stored: StoredDividend) -> Self {
        Self::new(stored.id, stored.user_id, stored.date, stored.stock, stored.amount)
    }
}

/// Keeps every dividend in one pretty-printed JSON array.
///
/// Each write reads the whole file, merges in memory, and rewrites it in
/// place. There is no locking and no atomic rename, so concurrent writers can
/// lose updates and a crash mid-write can leave a truncated file. Only suitable
/// for a single low-traffic process.
pub struct FileDividendStore {
    path: PathBuf,
    directory: OnceCell<()>,
}

impl FileDividendStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            directory: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_directory(&self) -> Result<()> {
        self.directory
            .get_or_try_init(|| async {
                if let Some(parent) = self
                    .path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Ok::<(), crate::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Dividend>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => {
                let stored: Vec<StoredDividend> = serde_json::from_str(&content)?;
                Ok(stored.into_iter().map(Dividend::from).collect())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    async fn write_all(&self, records: &[Dividend]) -> Result<()> {
        let stored: Vec<StoredDividend> = records.iter().map(StoredDividend::from).collect();
        let rendered = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, rendered).await?;
        Ok(())
    }
}

#[async_trait]
impl DividendStore for FileDividendStore {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Dividend>> {
        let mut records: Vec<Dividend> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|record| record.belongs_to(user_id))
            .collect();
        sort_for_listing(&mut records);
        Ok(records)
    }

    async fn upsert_batch(&self, records: &[Dividend]) -> Result<()> {
        validate_batch(records)?;
        if records.is_empty() {
            return Ok(());
        }

        self.ensure_directory().await?;
        let existing = self.read_all().await?;
        let merged = merge(existing, records);
        self.write_all(&merged).await?;
        tracing::debug!(
            path = %self.path.display(),
            incoming = records.len(),
            total = merged.len(),
            "Rewrote dividends file"
        );
        Ok(())
    }

    async fn delete_batch(&self, user_id: &str, ids: &[DividendId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let existing = self.read_all().await?;
        let (remaining, removed) = remove_ids(existing, user_id, ids);
        if removed > 0 {
            self.write_all(&remaining).await?;
        }
        Ok(removed)
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::File
    }
}
