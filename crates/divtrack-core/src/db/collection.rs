//! Document collections stored as JSON bodies in libSQL
//!
//! Each collection is a table of `(id, body)` rows where `body` is a JSON
//! object. Field lookups go through `json_extract`, so documents stay
//! schemaless while ids remain the unique key.

use libsql::Connection;
use serde_json::Value;

use crate::error::{Error, Result};

/// Equality filter on a top-level document field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    field: String,
    value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let field = field.into();
        ensure_identifier(&field)?;
        Ok(Self {
            field,
            value: value.into(),
        })
    }
}

/// One operation inside a bulk write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// Replace the document with this id, or insert it when absent
    UpsertOne { id: i64, document: Value },
    /// Delete the document with this id when it also matches `filter`
    DeleteOne {
        id: i64,
        filter: Option<FieldFilter>,
    },
}

/// Counts reported by a bulk write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub upserted: usize,
    pub deleted: usize,
}

/// A named document collection
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        ensure_identifier(&name)?;
        Ok(Self { name })
    }

    /// Create the collection and its field indexes if they are missing
    pub async fn ensure(&self, conn: &Connection, indexed_fields: &[&str]) -> Result<()> {
        let name = &self.name;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {name} (
                    id INTEGER PRIMARY KEY,
                    body TEXT NOT NULL CHECK (json_valid(body))
                )"
            ),
            (),
        )
        .await?;

        for field in indexed_fields {
            ensure_identifier(field)?;
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{name}_{field}
                     ON {name}(json_extract(body, '$.{field}'))"
                ),
                (),
            )
            .await?;
        }

        Ok(())
    }

    /// Documents matching `filter`, newest `sort_field` first
    pub async fn find(
        &self,
        conn: &Connection,
        filter: &FieldFilter,
        sort_field: &str,
    ) -> Result<Vec<Value>> {
        ensure_identifier(sort_field)?;
        let name = &self.name;
        let field = &filter.field;
        let sql = format!(
            "SELECT body FROM {name}
             WHERE json_extract(body, '$.{field}') = ?1
             ORDER BY json_extract(body, '$.{sort_field}') DESC, id DESC"
        );

        let mut rows = conn.query(&sql, [filter.value.as_str()]).await?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            documents.push(serde_json::from_str(&body)?);
        }
        Ok(documents)
    }

    /// Apply `operations` in order.
    ///
    /// Not atomic: the first failing operation aborts the rest and every
    /// operation before it stays applied.
    pub async fn bulk_write(
        &self,
        conn: &Connection,
        operations: Vec<WriteModel>,
    ) -> Result<BulkWriteResult> {
        let mut result = BulkWriteResult::default();
        let total = operations.len();

        for (index, operation) in operations.into_iter().enumerate() {
            let applied = match operation {
                WriteModel::UpsertOne { id, document } => {
                    self.upsert_one(conn, id, &document).await.map(|()| {
                        result.upserted += 1;
                    })
                }
                WriteModel::DeleteOne { id, filter } => self
                    .delete_one(conn, id, filter.as_ref())
                    .await
                    .map(|deleted| {
                        result.deleted += deleted;
                    }),
            };

            if let Err(error) = applied {
                tracing::warn!(
                    collection = %self.name,
                    failed_at = index,
                    total,
                    upserted = result.upserted,
                    deleted = result.deleted,
                    "Bulk write aborted part way through"
                );
                return Err(error);
            }
        }

        Ok(result)
    }

    async fn upsert_one(&self, conn: &Connection, id: i64, document: &Value) -> Result<()> {
        if !document.is_object() {
            return Err(Error::InvalidInput(format!(
                "document {id} in {} must be a JSON object",
                self.name
            )));
        }

        let name = &self.name;
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            &format!(
                "INSERT INTO {name} (id, body)
                 VALUES (?1, json_set(?2, '$.createdAt', ?3, '$.updatedAt', ?3))
                 ON CONFLICT(id) DO UPDATE SET body = json_set(
                     excluded.body,
                     '$.createdAt',
                     COALESCE(json_extract({name}.body, '$.createdAt'), ?3)
                 )"
            ),
            libsql::params![id, document.to_string(), now],
        )
        .await?;
        Ok(())
    }

    async fn delete_one(
        &self,
        conn: &Connection,
        id: i64,
        filter: Option<&FieldFilter>,
    ) -> Result<usize> {
        let name = &self.name;
        let affected = match filter {
            Some(filter) => {
                let field = &filter.field;
                conn.execute(
                    &format!(
                        "DELETE FROM {name} WHERE id = ?1 AND json_extract(body, '$.{field}') = ?2"
                    ),
                    libsql::params![id, filter.value.clone()],
                )
                .await?
            }
            None => {
                conn.execute(&format!("DELETE FROM {name} WHERE id = ?1"), [id])
                    .await?
            }
        };
        usize::try_from(affected).map_err(|error| Error::Database(error.to_string()))
    }
}

fn ensure_identifier(value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "`{value}` is not a valid collection or field name"
        )))
    }
}
