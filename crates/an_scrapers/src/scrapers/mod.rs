use std::time::Duration;

use an_core::{Article, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{redirect, Client};
use url::Url;

use crate::logging::Logger;

pub mod industry;
pub mod research;

use industry::{HuggingFaceScraper, TechCrunchScraper};
use research::{ArxivScraper, JairScraper, NatureScraper, PapersWithCodeScraper};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP settings shared by every scraper.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Applied to every outbound request.
    pub timeout: Duration,
    /// Sent to sources that reject default clients.
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns the news source this scraper produces articles for
    fn source(&self) -> Source;

    /// The listing page this scraper reads
    fn url(&self) -> &str;

    /// Fetches and parses the listing page.
    ///
    /// Errors cover the whole page: network failures, error statuses, timeouts
    /// and unexpected document structure. Bad entries are skipped instead.
    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>>;

    /// Like [`Scraper::scrape`], but a failed page yields no articles.
    async fn fetch(&self, log: &Logger) -> Vec<Article> {
        match self.scrape(log).await {
            Ok(articles) => articles,
            Err(e) => {
                log.warn(&format!("❌ Failed to fetch {}: {}", self.url(), e));
                Vec::new()
            }
        }
    }

    /// Returns a list of CLI shorthand names for this scraper
    fn cli_names(&self) -> Vec<&str> {
        vec![self.source().cli_name()]
    }
}

/// Enum that holds all possible scraper types
#[derive(Debug, Clone)]
pub enum ScraperType {
    Arxiv(ArxivScraper),
    PapersWithCode(PapersWithCodeScraper),
    Jair(JairScraper),
    TechCrunch(TechCrunchScraper),
    Nature(NatureScraper),
    HuggingFace(HuggingFaceScraper),
}

impl ScraperType {
    /// Builds the scraper for one source at its default URL.
    pub fn for_source(source: Source, config: &ScraperConfig) -> Result<Self> {
        Ok(match source {
            Source::Arxiv => ScraperType::Arxiv(ArxivScraper::new(config)?),
            Source::PapersWithCode => {
                ScraperType::PapersWithCode(PapersWithCodeScraper::new(config)?)
            }
            Source::Jair => ScraperType::Jair(JairScraper::new(config)?),
            Source::TechCrunch => ScraperType::TechCrunch(TechCrunchScraper::new(config)?),
            Source::Nature => ScraperType::Nature(NatureScraper::new(config)?),
            Source::HuggingFace => ScraperType::HuggingFace(HuggingFaceScraper::new(config)?),
        })
    }

    fn inner(&self) -> &dyn Scraper {
        match self {
            ScraperType::Arxiv(s) => s,
            ScraperType::PapersWithCode(s) => s,
            ScraperType::Jair(s) => s,
            ScraperType::TechCrunch(s) => s,
            ScraperType::Nature(s) => s,
            ScraperType::HuggingFace(s) => s,
        }
    }
}

#[async_trait]
impl Scraper for ScraperType {
    fn source(&self) -> Source {
        self.inner().source()
    }

    fn url(&self) -> &str {
        self.inner().url()
    }

    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>> {
        self.inner().scrape(log).await
    }
}

/// Returns one scraper per supported source, in a fixed order
pub fn get_scrapers(config: &ScraperConfig) -> Result<Vec<ScraperType>> {
    Source::ALL
        .into_iter()
        .map(|source| ScraperType::for_source(source, config))
        .collect()
}

/// A listing page plus the client used to download it.
#[derive(Debug, Clone)]
pub(crate) struct Listing {
    client: Client,
    url: Url,
}

impl Listing {
    pub(crate) fn new(config: &ScraperConfig, url: &str, spoof_user_agent: bool) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(10));
        if spoof_user_agent {
            builder = builder.user_agent(config.user_agent.clone());
        }
        Ok(Self {
            client: builder.build()?,
            url: Url::parse(url)?,
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    /// Downloads the page, returning the body and the instant it was fetched.
    pub(crate) async fn fetch(&self, log: &Logger) -> Result<(String, DateTime<Utc>)> {
        log.debug(&format!("🌐 Fetching {}", self.url));
        let fetched_at = Utc::now();
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        log.debug(&format!("📄 Received {} bytes", body.len()));
        Ok((body, fetched_at))
    }
}

/// Common utilities for scrapers
pub mod utils {
    use an_core::{Error, Result};
    use scraper::{ElementRef, Selector};
    use url::Url;

    /// Collapses whitespace runs (newlines included) into single spaces.
    pub fn clean_text(text: Option<&str>) -> String {
        text.map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    }

    /// Removes a leading label such as `Title:` and cleans the rest.
    pub fn strip_label(text: &str, label: &str) -> String {
        let cleaned = clean_text(Some(text));
        match cleaned.strip_prefix(label) {
            Some(rest) => rest.trim().to_string(),
            None => cleaned,
        }
    }

    pub fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css)
            .map_err(|e| Error::Scraping(format!("Invalid selector {}: {}", css, e)))
    }

    /// Cleaned text of an element and its descendants.
    pub fn element_text(element: ElementRef<'_>) -> String {
        clean_text(Some(&element.text().collect::<String>()))
    }

    pub fn first<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
        element.select(selector).next()
    }

    /// Cleaned text of the first match, if it has any.
    pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
        first(element, selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
        base.join(href.trim()).ok().map(|url| url.to_string())
    }

    /// Joins the non-empty parts with ` | `, or returns `empty` if none.
    pub fn compose_summary(parts: &[Option<String>], empty: &str) -> String {
        let parts: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            empty.to_string()
        } else {
            parts.join(" | ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::utils;
    use scraper::Html;

    #[test]
    fn test_clean_text() {
        assert_eq!(
            utils::clean_text(Some("  Deep\n\n   learning \t rocks ")),
            "Deep learning rocks"
        );
        assert_eq!(utils::clean_text(None), "");
        assert_eq!(utils::clean_text(Some("\n\t ")), "");
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(
            utils::strip_label("\n Title:\n  Attention Is All You Need ", "Title:"),
            "Attention Is All You Need"
        );
        assert_eq!(utils::strip_label("Pages: 1-20", "Pages:"), "1-20");
        assert_eq!(utils::strip_label("No label here", "Title:"), "No label here");
    }

    #[test]
    fn test_first_text_and_absolute_url() {
        let html = Html::parse_document(r#"<div class="card"><a href="/paper/x">  Paper
            X </a><p class="empty"> </p></div>"#);
        let card_sel = utils::selector("div.card").unwrap();
        let card = html.select(&card_sel).next().unwrap();

        let link = utils::selector("a").unwrap();
        assert_eq!(utils::first_text(card, &link).as_deref(), Some("Paper X"));
        assert_eq!(utils::first_text(card, &utils::selector("p.empty").unwrap()), None);

        let base = Url::parse("https://paperswithcode.com/latest").unwrap();
        assert_eq!(
            utils::absolute_url(&base, "/paper/x").as_deref(),
            Some("https://paperswithcode.com/paper/x")
        );
        assert_eq!(
            utils::absolute_url(&base, "https://elsewhere.test/a").as_deref(),
            Some("https://elsewhere.test/a")
        );
    }

    #[test]
    fn test_compose_summary() {
        let parts = [
            Some("By Ada".to_string()),
            None,
            Some(String::new()),
            Some("excerpt".to_string()),
        ];
        assert_eq!(utils::compose_summary(&parts, "No details available"), "By Ada | excerpt");
        assert_eq!(utils::compose_summary(&[None], "No details available"), "No details available");
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        assert!(utils::selector("div[").is_err());
    }

    #[test]
    fn test_get_scrapers_covers_every_source() {
        let scrapers = get_scrapers(&ScraperConfig::default()).unwrap();
        let sources: Vec<Source> = scrapers.iter().map(|s| s.source()).collect();
        assert_eq!(sources, Source::ALL.to_vec());
        assert!(scrapers.iter().all(|s| s.url().starts_with("https://")));
        assert_eq!(scrapers[0].cli_names(), vec!["arxiv"]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoints_yield_no_articles() {
        let config = ScraperConfig {
            timeout: Duration::from_secs(5),
            ..ScraperConfig::default()
        };
        // Nothing listens on port 9 locally, so every request is refused.
        let url = "http://127.0.0.1:9/listing";
        let scrapers: Vec<Box<dyn Scraper>> = vec![
            Box::new(ArxivScraper::with_url(&config, url).unwrap()),
            Box::new(PapersWithCodeScraper::with_url(&config, url).unwrap()),
            Box::new(JairScraper::with_url(&config, url).unwrap()),
            Box::new(TechCrunchScraper::with_url(&config, url).unwrap()),
            Box::new(NatureScraper::with_url(&config, url).unwrap()),
            Box::new(HuggingFaceScraper::with_url(&config, url).unwrap()),
        ];

        let log = Logger::new();
        for scraper in scrapers {
            assert!(scraper.scrape(&log).await.is_err());
            assert!(scraper.fetch(&log).await.is_empty(), "{} should be empty", scraper.source());
        }
    }
}
