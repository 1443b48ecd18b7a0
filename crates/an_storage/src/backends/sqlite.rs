use std::path::Path;
use std::str::FromStr;

use an_core::{
    Article, ArticleQuery, ArticleStorage, ArticleTransaction, Error, Result, Source, StoredArticle,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        article_id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        link TEXT NOT NULL,
        source TEXT NOT NULL,
        publication_date TEXT NOT NULL,
        UNIQUE(title, source)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_publication_date ON articles(publication_date)",
    "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source)",
];

const SELECT_ARTICLE: &str =
    "SELECT article_id, title, summary, link, source, publication_date FROM articles";

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

/// Fixed-width UTC text, so lexical order is chronological order.
fn encode_date(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_row(row: &SqliteRow) -> Result<StoredArticle> {
    let label: String = row.try_get("source").map_err(db_error("Failed to read source"))?;
    let source = Source::from_label(&label)
        .ok_or_else(|| Error::Database(format!("Unknown source label in database: {}", label)))?;
    let date: String = row.try_get("publication_date").map_err(db_error("Failed to read date"))?;
    let publication_date = DateTime::parse_from_rfc3339(&date)
        .map_err(|e| Error::Database(format!("Invalid stored date {:?}: {}", date, e)))?
        .with_timezone(&Utc);

    Ok(StoredArticle {
        article_id: row.try_get("article_id").map_err(db_error("Failed to read id"))?,
        article: Article {
            title: row.try_get("title").map_err(db_error("Failed to read title"))?,
            summary: row.try_get("summary").map_err(db_error("Failed to read summary"))?,
            link: row.try_get("link").map_err(db_error("Failed to read link"))?,
            source,
            publication_date,
        },
    })
}

pub struct SQLiteStorage {
    pool: SqlitePool,
}

impl SQLiteStorage {
    /// Opens (creating if needed) the database at `url`, e.g. `sqlite://articles.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error("Invalid database URL"))?
            .create_if_missing(true);
        Self::with_options(options).await
    }

    pub async fn new_with_path(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
        Self::with_options(options).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        tracing::debug!(migrations = MIGRATIONS.len(), "SQLite schema ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn name() -> &'static str {
        "sqlite"
    }

    async fn open(url: &str) -> Result<Self> {
        Self::connect(url).await
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>> {
        let tx = self.pool.begin().await.map_err(db_error("Failed to open transaction"))?;
        Ok(Box::new(SQLiteTransaction { tx }))
    }

    async fn find_by_title_and_source(
        &self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>> {
        let row = sqlx::query(&format!("{} WHERE title = ? AND source = ?", SELECT_ARTICLE))
            .bind(title)
            .bind(source.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to look up article"))?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        let mut sql = format!("{} WHERE 1 = 1", SELECT_ARTICLE);
        if query.since.is_some() {
            sql.push_str(" AND publication_date >= ?");
        }
        if query.source.is_some() {
            sql.push_str(" AND source = ?");
        }
        sql.push_str(" ORDER BY publication_date DESC, article_id DESC");

        let mut statement = sqlx::query(&sql);
        if let Some(since) = &query.since {
            statement = statement.bind(encode_date(since));
        }
        if let Some(source) = &query.source {
            statement = statement.bind(source.as_str());
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list articles"))?;
        rows.iter().map(decode_row).collect()
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT source FROM articles ORDER BY source")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list sources"))?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("source")
                    .map_err(db_error("Failed to read source"))
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count articles"))?;
        Ok(count.max(0) as usize)
    }
}

/// A batch of inserts inside one SQLite transaction. Dropped without commit, it rolls back.
pub struct SQLiteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl ArticleTransaction for SQLiteTransaction {
    async fn find_by_title_and_source(
        &mut self,
        title: &str,
        source: Source,
    ) -> Result<Option<StoredArticle>> {
        let row = sqlx::query(&format!("{} WHERE title = ? AND source = ?", SELECT_ARTICLE))
            .bind(title)
            .bind(source.label())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("Failed to look up article"))?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn insert(&mut self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (title, summary, link, source, publication_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.link)
        .bind(article.source.label())
        .bind(encode_date(&article.publication_date))
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert article"))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(db_error("Failed to commit"))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(db_error("Failed to roll back"))
    }
}
