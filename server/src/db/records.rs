//! The records table as a remote store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quizdraft_engine::Record;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::remote::{Filter, RemoteError, RemoteStore};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub collection: String,
    pub record_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            collection: row.try_get("collection")?,
            record_id: row.try_get("record_id")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Convert a database row to an engine record.
    pub fn into_record(self) -> Record {
        Record::new(self.record_id, self.payload)
    }
}

/// Remote store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn not_found(collection: &str, id: &str) -> RemoteError {
        RemoteError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn fetch_all(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, RemoteError> {
        let rows = sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT collection, record_id, payload, created_at, updated_at
            FROM records
            WHERE collection = $1 AND payload->>$2 = ANY($3)
            ORDER BY created_at, record_id
            "#,
        )
        .bind(collection)
        .bind(&filter.field)
        .bind(&filter.values)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredRecord::into_record).collect())
    }

    async fn fetch_one(&self, collection: &str, id: &str) -> Result<Option<Record>, RemoteError> {
        let row = sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT collection, record_id, payload, created_at, updated_at
            FROM records
            WHERE collection = $1 AND record_id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoredRecord::into_record))
    }

    async fn insert(&self, collection: &str, payload: &Value) -> Result<Record, RemoteError> {
        let record_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, StoredRecord>(
            r#"
            INSERT INTO records (collection, record_id, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING collection, record_id, payload, created_at, updated_at
            "#,
        )
        .bind(collection)
        .bind(&record_id)
        .bind(payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_record())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        let result = sqlx::query(
            r#"
            UPDATE records SET payload = $3, updated_at = $4
            WHERE collection = $1 AND record_id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = $1 AND record_id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(collection, id));
        }
        Ok(())
    }
}
