use an_core::{Article, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::dates::{DateResolver, DateToken};
use crate::logging::Logger;
use crate::scrapers::utils::{
    absolute_url, compose_summary, element_text, first, first_text, selector,
};
use crate::scrapers::{Listing, Scraper, ScraperConfig};

#[derive(Debug, Clone)]
pub struct TechCrunchScraper {
    listing: Listing,
}

impl TechCrunchScraper {
    const BASE_URL: &'static str = "https://techcrunch.com/category/artificial-intelligence/";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_url(config, Self::BASE_URL)
    }

    pub fn with_url(config: &ScraperConfig, url: &str) -> Result<Self> {
        Ok(Self {
            listing: Listing::new(config, url, true)?,
        })
    }

    pub fn parse_listing(
        html: &str,
        page_url: &Url,
        fetched_at: DateTime<Utc>,
        log: &Logger,
    ) -> Result<Vec<Article>> {
        let document = Html::parse_document(html);
        let selectors = PostSelectors::new()?;
        let resolver = DateResolver::new(fetched_at);

        let mut articles = Vec::new();
        for block in document.select(&selectors.block) {
            let Some(raw) = selectors.extract(block, page_url) else {
                log.debug("Skipping post block without a title link");
                continue;
            };
            let token = match (raw.datetime.as_deref(), raw.time_text.as_deref()) {
                (Some(attr), _) => DateToken::Structured(attr),
                (None, Some(text)) => DateToken::Text(text),
                (None, None) => DateToken::Missing,
            };
            let publication_date = resolver.resolve(token, log);
            articles.extend(raw.into_article(publication_date));
        }

        log.info(&format!("📰 Parsed {} TechCrunch posts", articles.len()));
        Ok(articles)
    }
}

struct PostSelectors {
    block: Selector,
    title_link: Selector,
    author: Selector,
    excerpt: Selector,
    time: Selector,
    categories: Selector,
}

impl PostSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            block: selector("div.post-block")?,
            title_link: selector("h2.post-block__title a[href]")?,
            author: selector("span.river-byline__authors a")?,
            excerpt: selector("div.post-block__content")?,
            time: selector("time.river-byline__time")?,
            categories: selector("span.river-byline__categories a")?,
        })
    }

    fn extract(&self, block: ElementRef<'_>, page_url: &Url) -> Option<RawPost> {
        let title_link = first(block, &self.title_link)?;
        let time = first(block, &self.time);

        let categories: Vec<String> = block
            .select(&self.categories)
            .map(element_text)
            .filter(|c| !c.is_empty())
            .collect();

        Some(RawPost {
            title: element_text(title_link),
            link: absolute_url(page_url, title_link.value().attr("href")?)?,
            author: first_text(block, &self.author),
            excerpt: first_text(block, &self.excerpt),
            datetime: time
                .and_then(|t| t.value().attr("datetime"))
                .map(|attr| attr.trim().to_string())
                .filter(|attr| !attr.is_empty()),
            time_text: time.map(element_text).filter(|t| !t.is_empty()),
            categories: (!categories.is_empty()).then(|| categories.join(", ")),
        })
    }
}

struct RawPost {
    title: String,
    link: String,
    author: Option<String>,
    excerpt: Option<String>,
    datetime: Option<String>,
    time_text: Option<String>,
    categories: Option<String>,
}

impl RawPost {
    fn into_article(self, publication_date: DateTime<Utc>) -> Option<Article> {
        let summary = compose_summary(
            &[
                self.author.map(|a| format!("By {}", a)),
                self.categories.map(|c| format!("Categories: {}", c)),
                self.excerpt,
            ],
            "No details available",
        );
        Article::new(self.title, summary, self.link, Source::TechCrunch, publication_date)
    }
}

#[async_trait]
impl Scraper for TechCrunchScraper {
    fn source(&self) -> Source {
        Source::TechCrunch
    }

    fn url(&self) -> &str {
        self.listing.url().as_str()
    }

    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>> {
        let (html, fetched_at) = self.listing.fetch(log).await?;
        Self::parse_listing(&html, self.listing.url(), fetched_at, log)
    }
}
