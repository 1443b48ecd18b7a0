use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use an_core::{ArticleStorage, Error, Result};
use async_trait::async_trait;

pub mod backends;

pub use backends::*;

/// A storage implementation that can be opened from a URL.
#[async_trait]
pub trait StorageBackend: ArticleStorage + Sized {
    fn name() -> &'static str;
    async fn open(url: &str) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    Memory,
    #[default]
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageKind::Memory),
            "sqlite" => Ok(StorageKind::Sqlite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Memory => f.write_str(MemoryStorage::name()),
            StorageKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

async fn open_backend<B: StorageBackend + 'static>(url: &str) -> Result<Arc<dyn ArticleStorage>> {
    tracing::info!(backend = B::name(), "💾 Opening storage");
    Ok(Arc::new(B::open(url).await?))
}

/// Opens the chosen backend. `url` is ignored by the memory backend.
pub async fn create_storage(kind: StorageKind, url: &str) -> Result<Arc<dyn ArticleStorage>> {
    match kind {
        StorageKind::Memory => open_backend::<MemoryStorage>(url).await,
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => open_backend::<SQLiteStorage>(url).await,
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(Error::Config(
            "SQLite storage requires the `sqlite` feature".to_string(),
        )),
    }
}
