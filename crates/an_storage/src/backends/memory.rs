use std::collections::BTreeSet;
use std::sync::Arc;

use an_core::{
    Article, ArticleQuery, ArticleStorage, ArticleTransaction, Error, Result, Source, StoredArticle,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Debug, Default)]
struct MemoryStore {
    next_id: i64,
    articles: Vec<StoredArticle>,
}

impl MemoryStore {
    fn find(&self, title: &str, source: Source) -> Option<&StoredArticle> {
        self.articles
            .iter()
            .find(|stored| stored.article.title == title && stored.article.source == source)
    }
}

/// Process-local store. Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name() -> &'static str {
        "memory"
    }

    async fn open(_url: &str) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: Arc::clone(&self.store),
            pending: Vec::new(),
        }))
    }

    async fn find_by_title_and_source(
        &self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>> {
        Ok(self.store.read().await.find(title, source).cloned())
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        let store = self.store.read().await;
        let mut articles: Vec<StoredArticle> = store
            .articles
            .iter()
            .filter(|stored| query.matches(&stored.article))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            b.article
                .publication_date
                .cmp(&a.article.publication_date)
                .then(b.article_id.cmp(&a.article_id))
        });
        Ok(articles)
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let store = self.store.read().await;
        let labels: BTreeSet<&str> =
            store.articles.iter().map(|s| s.article.source.label()).collect();
        Ok(labels.into_iter().map(str::to_string).collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.store.read().await.articles.len())
    }
}

/// Staged inserts, applied all at once on commit.
pub struct MemoryTransaction {
    store: Arc<RwLock<MemoryStore>>,
    pending: Vec<Article>,
}

#[async_trait]
impl ArticleTransaction for MemoryTransaction {
    async fn find_by_title_and_source(
        &mut self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>> {
        if let Some(stored) = self.store.read().await.find(title, source) {
            return Ok(Some(stored.clone()));
        }
        // Staged rows have no id until they are committed.
        Ok(self
            .pending
            .iter()
            .find(|a| a.title == title && a.source == source)
            .map(|article| StoredArticle {
                article_id: 0,
                article: article.clone(),
            }))
    }

    async fn insert(&mut self, article: &Article) -> Result<()> {
        self.pending.push(article.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { store, pending } = *self;
        let mut store = store.write().await;

        {
            let mut keys = BTreeSet::new();
            for article in &pending {
                let key = (article.title.as_str(), article.source);
                if !keys.insert(key) || store.find(&article.title, article.source).is_some() {
                    return Err(Error::Database(format!(
                        "UNIQUE constraint failed: articles.title, articles.source ({:?}, {})",
                        article.title, article.source
                    )));
                }
            }
        }

        for article in pending {
            store.next_id += 1;
            let article_id = store.next_id;
            store.articles.push(StoredArticle { article_id, article });
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
