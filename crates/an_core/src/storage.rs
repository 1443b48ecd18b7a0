use async_trait::async_trait;

use crate::Result;
use crate::types::{Article, ArticleQuery, Source, StoredArticle};

/// Persistent article store keyed on (title, source).
#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Open a batch of inserts that becomes visible only on commit.
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>>;

    async fn find_by_title_and_source(
        &self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>>;

    /// Articles matching the query, newest first.
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>>;

    /// Distinct source labels present in the store.
    async fn list_sources(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<usize>;
}

/// A pending batch of inserts.
///
/// Lookups see the inserts already staged in the same batch. Dropping a
/// transaction without committing discards it.
#[async_trait]
pub trait ArticleTransaction: Send {
    async fn find_by_title_and_source(
        &mut self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>>;

    async fn insert(&mut self, article: &Article) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
