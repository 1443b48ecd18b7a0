use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use an_core::{ArticleQuery, ArticleStorage};
use an_scrapers::{handle_command, init_logging, ScraperArgs, ScraperConfig, ScraperManager};
use an_storage::{create_storage, StorageKind};
use an_web::{create_app, AppState};
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();

        for c in s.trim().chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
                continue;
            }
            if c.is_whitespace() {
                continue;
            }
            let num: u64 = current_number
                .parse()
                .map_err(|_| format!("Expected a number before '{}'", c))?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total_seconds = num
                .checked_mul(unit)
                .and_then(|secs| total_seconds.checked_add(secs))
                .ok_or_else(|| "Duration is too long".to_string())?;
            current_number.clear();
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num: u64 = current_number
                .parse()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| "Duration is too long".to_string())?;
        }

        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ainews",
    author,
    version,
    about = "Collects AI news and research articles and serves them over HTTP"
)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "STORAGE", default_value = "sqlite", global = true)]
    storage: StorageKind,
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://articles.db", global = true)]
    database_url: String,
    /// Timeout applied to every source request
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30, global = true)]
    fetch_timeout_secs: u64,
    /// User agent sent to sources that block default clients
    #[arg(long, env = "SCRAPER_USER_AGENT", global = true)]
    user_agent: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
        /// Comma separated list of allowed origins, or *
        #[arg(
            long,
            env = "CORS_ORIGINS",
            default_value = "http://localhost:3000",
            value_delimiter = ','
        )]
        cors_origins: Vec<String>,
    },
    /// Fetch all sources and store new articles
    Refresh {
        /// Keep refreshing with this interval (e.g. 30m, 1h, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Dry-run scrapers without storing anything
    Scrape(ScraperArgs),
    /// Print stored articles
    Articles {
        /// Hours to look back, 0 for everything
        #[arg(long, default_value_t = 24)]
        timeframe: u32,
        /// Only articles from this source label
        #[arg(long)]
        source: Option<String>,
    },
    /// Print the sources present in storage
    Sources,
}

impl Cli {
    fn scraper_config(&self) -> ScraperConfig {
        let mut config = ScraperConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..ScraperConfig::default()
        };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

async fn open_storage(
    kind: StorageKind,
    url: &str,
    max_retries: u32,
) -> anyhow::Result<Arc<dyn ArticleStorage>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match create_storage(kind, url).await {
            Ok(storage) => {
                let count = storage.count().await?;
                info!("🏦 Storage ready (using {}, {} articles)", kind, count);
                return Ok(storage);
            }
            Err(e) if attempt < max_retries => {
                info!(
                    "Storage initialization failed ({}), retrying {}/{}...",
                    e, attempt, max_retries
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Could not open {} storage at {}", kind, url))
            }
        }
    }
}

async fn refresh_once(
    manager: &ScraperManager,
    storage: &dyn ArticleStorage,
) -> anyhow::Result<()> {
    let summary = manager.refresh(storage).await?;
    println!("✅ {} ({} new)", summary.message, summary.count);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    init_logging();
    let cli = Cli::parse();

    let manager = ScraperManager::new(&cli.scraper_config())?;
    info!("🦗 {} scrapers initialized", manager.scrapers().len());

    match cli.command {
        Commands::Scrape(args) => {
            handle_command(args, &manager).await?;
        }
        Commands::Serve { host, port, cors_origins } => {
            let storage = open_storage(cli.storage, &cli.database_url, 3).await?;
            let app = create_app(AppState::new(storage, manager), &cors_origins);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("🌐 Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Refresh { interval } => {
            let storage = open_storage(cli.storage, &cli.database_url, 3).await?;
            match interval {
                Some(HumanDuration(every)) => {
                    info!("Running in periodic mode with {}s interval", every.as_secs());
                    loop {
                        if let Err(e) = refresh_once(&manager, storage.as_ref()).await {
                            tracing::error!("❌ Refresh failed: {:#}", e);
                        }
                        info!("Waiting {}s before next refresh", every.as_secs());
                        tokio::time::sleep(every).await;
                    }
                }
                None => refresh_once(&manager, storage.as_ref()).await?,
            }
        }
        Commands::Articles { timeframe, source } => {
            let storage = open_storage(cli.storage, &cli.database_url, 1).await?;
            let query =
                ArticleQuery::within_hours(i64::from(timeframe), Utc::now()).with_source(source);
            let articles = storage.list_articles(&query).await?;
            for stored in &articles {
                let article = &stored.article;
                println!(
                    "📰 #{} [{}] {} ({})",
                    stored.article_id,
                    article.source,
                    article.title,
                    article.publication_date.format("%Y-%m-%d %H:%M")
                );
                println!("    {}", article.link);
                if !article.summary.is_empty() {
                    println!("    {}", article.summary.replace('\n', " "));
                }
            }
            println!("Found {} articles", articles.len());
        }
        Commands::Sources => {
            let storage = open_storage(cli.storage, &cli.database_url, 1).await?;
            for source in storage.list_sources().await? {
                println!("{}", source);
            }
        }
    }

    Ok(())
}
