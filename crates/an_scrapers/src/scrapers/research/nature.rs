use an_core::{Article, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use url::Url;

use crate::dates::{DateResolver, DateToken};
use crate::logging::Logger;
use crate::scrapers::utils::{absolute_url, element_text, first, first_text, selector};
use crate::scrapers::{Listing, Scraper, ScraperConfig};

#[derive(Debug, Clone)]
pub struct NatureScraper {
    listing: Listing,
}

impl NatureScraper {
    const BASE_URL: &'static str =
        "https://www.nature.com/search?q=artificial%20intelligence&journal=nature";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_url(config, Self::BASE_URL)
    }

    pub fn with_url(config: &ScraperConfig, url: &str) -> Result<Self> {
        Ok(Self {
            listing: Listing::new(config, url, true)?,
        })
    }

    /// Parses a search results page.
    pub fn parse_listing(
        html: &str,
        page_url: &Url,
        fetched_at: DateTime<Utc>,
        log: &Logger,
    ) -> Result<Vec<Article>> {
        let document = Html::parse_document(html);
        let row: Selector = selector("li.app-article-list-row")?;
        let card_link = selector("a.c-card__link")?;
        let summary = selector("div.c-card__summary")?;
        let time = selector("time")?;
        let resolver = DateResolver::new(fetched_at);

        let mut articles = Vec::new();
        for item in document.select(&row) {
            let Some(link_el) = first(item, &card_link) else {
                log.debug("Skipping search result without a card link");
                continue;
            };
            let href = link_el.value().attr("href");
            let Some(link) = href.and_then(|href| absolute_url(page_url, href)) else {
                continue;
            };

            let token = match first(item, &time) {
                Some(el) => el
                    .value()
                    .attr("datetime")
                    .map_or(DateToken::Missing, DateToken::Structured),
                None => DateToken::Missing,
            };
            let publication_date = resolver.resolve(token, log);
            let description = first_text(item, &summary).unwrap_or_default();

            let title = element_text(link_el);
            if let Some(article) =
                Article::new(title, description, link, Source::Nature, publication_date)
            {
                articles.push(article);
            }
        }

        log.info(&format!("📚 Parsed {} Nature results", articles.len()));
        Ok(articles)
    }
}

#[async_trait]
impl Scraper for NatureScraper {
    fn source(&self) -> Source {
        Source::Nature
    }

    fn url(&self) -> &str {
        self.listing.url().as_str()
    }

    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>> {
        let (html, fetched_at) = self.listing.fetch(log).await?;
        Self::parse_listing(&html, self.listing.url(), fetched_at, log)
    }
}
