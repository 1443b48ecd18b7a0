use std::sync::Arc;

use an_core::{Article, ArticleStorage, Error, RefreshSummary, Result, Source};
use chrono::Utc;
use futures::future::join_all;

use crate::logging::Logger;
use crate::scrapers::{get_scrapers, Scraper, ScraperConfig};

/// Outcome of one source within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: Source,
    pub count: usize,
    pub error: Option<String>,
    /// Entries whose date could not be read and were stamped with the fetch time.
    pub date_fallbacks: usize,
}

/// Everything collected by one run, in scraper registration order.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub articles: Vec<Article>,
    pub sources: Vec<SourceReport>,
}

impl IngestReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

pub struct ScraperManager {
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl ScraperManager {
    /// Manager over every supported source.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let scrapers = get_scrapers(config)?
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn Scraper>)
            .collect();
        Ok(Self { scrapers })
    }

    pub fn with_scrapers(scrapers: Vec<Arc<dyn Scraper>>) -> Self {
        Self { scrapers }
    }

    pub fn scrapers(&self) -> &[Arc<dyn Scraper>] {
        &self.scrapers
    }

    /// Scrapers matching a CLI name or source label, case-insensitively.
    pub fn scrapers_for_source(&self, name: &str) -> Vec<Arc<dyn Scraper>> {
        let wanted = name.trim();
        self.scrapers
            .iter()
            .filter(|scraper| {
                scraper.source().label().eq_ignore_ascii_case(wanted)
                    || scraper.cli_names().iter().any(|n| n.eq_ignore_ascii_case(wanted))
            })
            .cloned()
            .collect()
    }

    /// Runs every scraper concurrently and gathers what they found.
    ///
    /// A failing or panicking scraper contributes nothing; the rest are kept.
    pub async fn fetch_all(&self) -> IngestReport {
        Self::run(self.scrapers.clone()).await
    }

    pub async fn fetch_source(&self, name: &str) -> Result<IngestReport> {
        let scrapers = self.scrapers_for_source(name);
        if scrapers.is_empty() {
            return Err(Error::Config(format!("No scraper found for source: {}", name)));
        }
        Ok(Self::run(scrapers).await)
    }

    async fn run(scrapers: Vec<Arc<dyn Scraper>>) -> IngestReport {
        let run_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        let run_log = Logger::new().with_new_prefixes(run_id);
        run_log.info(&format!("🚀 Fetching from {} sources", scrapers.len()));

        let handles: Vec<_> = scrapers
            .iter()
            .map(|scraper| {
                let scraper = Arc::clone(scraper);
                let log = run_log.with_prefix(scraper.source().label());
                tokio::spawn(async move {
                    let result = scraper.scrape(&log).await;
                    (result, log.data_quality_count())
                })
            })
            .collect();

        let mut report = IngestReport::default();
        for (scraper, outcome) in scrapers.iter().zip(join_all(handles).await) {
            let source = scraper.source();
            let (articles, error, date_fallbacks) = match outcome {
                Ok((Ok(articles), fallbacks)) => (articles, None, fallbacks),
                Ok((Err(e), fallbacks)) => {
                    run_log.error(&format!("❌ {} failed: {}", source, e));
                    (Vec::new(), Some(e.to_string()), fallbacks)
                }
                Err(e) => {
                    run_log.error(&format!("💥 {} task aborted: {}", source, e));
                    (Vec::new(), Some(e.to_string()), 0)
                }
            };

            run_log.info(&format!("📰 {}: {} articles", source, articles.len()));
            if let Some(sample) = articles.first() {
                run_log.debug(&format!(
                    "🔎 Sample from {}: {} ({})",
                    source, sample.title, sample.link
                ));
            }
            if date_fallbacks > 0 {
                run_log.warn(&format!(
                    "📅 {}: {} dates defaulted to fetch time",
                    source, date_fallbacks
                ));
            }

            report.sources.push(SourceReport {
                source,
                count: articles.len(),
                error,
                date_fallbacks,
            });
            report.articles.extend(articles);
        }

        run_log.info(&format!("✅ Collected {} articles", report.articles.len()));
        report
    }

    /// Fetches every source and stores articles not seen before.
    ///
    /// Deduplication is on (title, source) and covers articles staged earlier in
    /// the same run. All inserts land in one transaction; if it cannot be
    /// committed nothing is stored and [`Error::Storage`] is returned.
    pub async fn refresh(&self, storage: &dyn ArticleStorage) -> Result<RefreshSummary> {
        let report = self.fetch_all().await;
        let log = Logger::new().with_new_prefixes("refresh".to_string());

        let mut tx = storage.begin().await?;
        let mut added = 0;
        for article in &report.articles {
            match tx.find_by_title_and_source(&article.title, article.source).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    log.warn(&format!("⚠️ Lookup failed for {:?}: {}", article.title, e));
                    continue;
                }
            }
            match tx.insert(article).await {
                Ok(()) => added += 1,
                Err(e) => log.warn(&format!("⚠️ Could not stage {:?}: {}", article.title, e)),
            }
        }

        if let Err(e) = tx.commit().await {
            log.error(&format!("💾 Commit failed: {}", e));
            return Err(Error::Storage(format!("commit failed: {}", e)));
        }

        log.info(&format!("💾 Stored {} new articles", added));
        Ok(RefreshSummary::refreshed(added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use an_core::{ArticleQuery, ArticleTransaction, StoredArticle};
    use an_storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};

    struct MockScraper {
        source: Source,
        count: usize,
        panics: bool,
    }

    impl MockScraper {
        fn returning(source: Source, count: usize) -> Arc<dyn Scraper> {
            Arc::new(Self { source, count, panics: false })
        }

        fn panicking(source: Source) -> Arc<dyn Scraper> {
            Arc::new(Self { source, count: 0, panics: true })
        }
    }

    fn published() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[async_trait]
    impl Scraper for MockScraper {
        fn source(&self) -> Source {
            self.source
        }

        fn url(&self) -> &str {
            "http://mock.test/"
        }

        async fn scrape(&self, _log: &Logger) -> Result<Vec<Article>> {
            if self.panics {
                panic!("scraper blew up");
            }
            Ok((0..self.count)
                .filter_map(|i| {
                    Article::new(
                        format!("{} article {}", self.source.cli_name(), i),
                        "summary",
                        format!("http://mock.test/{}", i),
                        self.source,
                        published(),
                    )
                })
                .collect())
        }
    }

    struct FailingScraper;

    #[async_trait]
    impl Scraper for FailingScraper {
        fn source(&self) -> Source {
            Source::Nature
        }

        fn url(&self) -> &str {
            "http://mock.test/"
        }

        async fn scrape(&self, _log: &Logger) -> Result<Vec<Article>> {
            Err(Error::Scraping("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_panicking_scraper_does_not_sink_the_run() {
        let manager = ScraperManager::with_scrapers(vec![
            MockScraper::returning(Source::Arxiv, 3),
            MockScraper::panicking(Source::Jair),
        ]);

        let report = manager.fetch_all().await;
        assert_eq!(report.articles.len(), 3);
        assert!(report.articles.iter().all(|a| a.source == Source::Arxiv));
        assert_eq!(report.sources[0].count, 3);
        assert!(report.sources[1].error.is_some());
        assert_eq!(report.failed_sources().count(), 1);
    }

    #[tokio::test]
    async fn test_failing_scraper_is_reported() {
        let manager = ScraperManager::with_scrapers(vec![
            Arc::new(FailingScraper),
            MockScraper::returning(Source::TechCrunch, 2),
        ]);

        let report = manager.fetch_all().await;
        assert_eq!(report.articles.len(), 2);
        assert_eq!(report.sources[0].error.as_deref(), Some("Scraping error: boom"));
    }

    #[tokio::test]
    async fn test_fetch_source_by_name() {
        let manager = ScraperManager::with_scrapers(vec![
            MockScraper::returning(Source::Arxiv, 1),
            MockScraper::returning(Source::HuggingFace, 2),
        ]);

        let report = manager.fetch_source("huggingface").await.unwrap();
        assert_eq!(report.articles.len(), 2);
        let report = manager.fetch_source("arXiv CS.AI").await.unwrap();
        assert_eq!(report.articles.len(), 1);
        assert!(manager.fetch_source("reddit").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_twice_adds_nothing_new() {
        let storage = MemoryStorage::new();
        let manager = ScraperManager::with_scrapers(vec![
            MockScraper::returning(Source::Arxiv, 3),
            MockScraper::panicking(Source::Jair),
        ]);

        let first = manager.refresh(&storage).await.unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.message, "Articles refreshed successfully");

        let second = manager.refresh(&storage).await.unwrap();
        assert_eq!(second.count, 0);
        assert_eq!(storage.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_run_are_stored_once() {
        let storage = MemoryStorage::new();
        let manager = ScraperManager::with_scrapers(vec![
            MockScraper::returning(Source::Arxiv, 2),
            MockScraper::returning(Source::Arxiv, 2),
        ]);

        let summary = manager.refresh(&storage).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(storage.count().await.unwrap(), 2);
    }

    /// Storage whose transactions never commit.
    struct CommitFails {
        inner: MemoryStorage,
    }

    struct CommitFailsTx {
        inner: Box<dyn ArticleTransaction>,
    }

    #[async_trait]
    impl ArticleTransaction for CommitFailsTx {
        async fn find_by_title_and_source(
            &mut self,
            title: &str,
            source: Source,
        ) -> Result<Option<StoredArticle>> {
            self.inner.find_by_title_and_source(title, source).await
        }

        async fn insert(&mut self, article: &Article) -> Result<()> {
            self.inner.insert(article).await
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            self.inner.rollback().await?;
            Err(Error::Database("disk full".to_string()))
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl ArticleStorage for CommitFails {
        async fn begin(&self) -> Result<Box<dyn ArticleTransaction>> {
            Ok(Box::new(CommitFailsTx { inner: self.inner.begin().await? }))
        }

        async fn find_by_title_and_source(
            &self,
            title: &str,
            source: Source,
        ) -> Result<Option<StoredArticle>> {
            self.inner.find_by_title_and_source(title, source).await
        }

        async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
            self.inner.list_articles(query).await
        }

        async fn list_sources(&self) -> Result<Vec<String>> {
            self.inner.list_sources().await
        }

        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_commit_failure_persists_nothing() {
        let storage = CommitFails { inner: MemoryStorage::new() };
        let manager = ScraperManager::with_scrapers(vec![MockScraper::returning(Source::Arxiv, 3)]);

        let result = manager.refresh(&storage).await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
