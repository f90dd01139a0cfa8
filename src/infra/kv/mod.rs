//! Key-value store adapters.

mod file;
mod memory;
mod postgres;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use postgres::PostgresKvStore;

use std::sync::Arc;

use tracing::info;

use crate::application::store::KvStore;
use crate::config::{StoreBackend, StoreSettings};
use crate::infra::error::InfraError;

/// Open the configured backend, running migrations where the backend has any.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn KvStore>, InfraError> {
    match &settings.backend {
        StoreBackend::Memory => {
            info!(target = "mdkv::store", backend = "memory", "opening store");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StoreBackend::File { directory } => {
            info!(
                target = "mdkv::store",
                backend = "file",
                directory = %directory.display(),
                "opening store"
            );
            Ok(Arc::new(FileKvStore::new(directory.clone())?))
        }
        StoreBackend::Postgres {
            url,
            max_connections,
        } => {
            info!(
                target = "mdkv::store",
                backend = "postgres",
                max_connections = max_connections.get(),
                "opening store"
            );
            let pool = PostgresKvStore::connect(url, max_connections.get())
                .await
                .map_err(|err| InfraError::store(err.to_string()))?;
            PostgresKvStore::run_migrations(&pool)
                .await
                .map_err(|err| InfraError::store(err.to_string()))?;
            Ok(Arc::new(PostgresKvStore::new(pool)))
        }
    }
}
