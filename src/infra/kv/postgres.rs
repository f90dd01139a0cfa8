//! Postgres-backed key-value store using a single `kv_entries` table.

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query, query_scalar,
};

use crate::application::store::{KvStore, StoreError};

#[derive(Clone)]
pub struct PostgresKvStore {
    pool: PgPool,
}

impl PostgresKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl KvStore for PostgresKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        query_scalar::<_, Vec<u8>>("SELECT value FROM kv_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map(|value| value.map(Bytes::from))
            .map_err(map_sqlx_error)
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(value.as_ref())
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(io) => StoreError::Io(io),
        other => StoreError::from_backend(other),
    }
}
