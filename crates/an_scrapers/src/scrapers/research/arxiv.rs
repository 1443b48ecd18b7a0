use an_core::{Article, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use url::Url;

use crate::logging::Logger;
use crate::scrapers::utils::{
    compose_summary, element_text, first, first_text, selector, strip_label,
};
use crate::scrapers::{Listing, Scraper, ScraperConfig};

#[derive(Debug, Clone)]
pub struct ArxivScraper {
    listing: Listing,
}

impl ArxivScraper {
    const BASE_URL: &'static str = "https://arxiv.org/list/cs.AI/new";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_url(config, Self::BASE_URL)
    }

    pub fn with_url(config: &ScraperConfig, url: &str) -> Result<Self> {
        // arXiv serves default clients fine.
        Ok(Self {
            listing: Listing::new(config, url, false)?,
        })
    }

    /// Parses the "New submissions" block of a listing page.
    ///
    /// Every entry is dated at `fetched_at`: the page only lists today's papers.
    pub fn parse_listing(
        html: &str,
        _page_url: &Url,
        fetched_at: DateTime<Utc>,
        log: &Logger,
    ) -> Result<Vec<Article>> {
        let document = Html::parse_document(html);
        let headings_and_lists = selector("h3, dl")?;

        let mut in_section = false;
        let mut list = None;
        for element in document.select(&headings_and_lists) {
            match element.value().name() {
                "h3" if element_text(element).contains("New submissions") => in_section = true,
                "dl" if in_section => {
                    list = Some(element);
                    break;
                }
                _ => {}
            }
        }

        let Some(list) = list else {
            log.warn("⚠️ No \"New submissions\" section found");
            return Ok(Vec::new());
        };

        let selectors = EntrySelectors::new()?;
        let mut articles = Vec::new();
        let mut pending_id: Option<String> = None;
        for child in list.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "dt" => pending_id = selectors.entry_id(child),
                "dd" => {
                    let id = pending_id.take();
                    match selectors.entry(id, child).and_then(|raw| raw.into_article(fetched_at)) {
                        Some(article) => articles.push(article),
                        None => log.debug("Skipping arXiv entry without title or id"),
                    }
                }
                _ => {}
            }
        }

        log.info(&format!("📚 Parsed {} arXiv submissions", articles.len()));
        Ok(articles)
    }
}

struct EntrySelectors {
    abstract_link: scraper::Selector,
    title: scraper::Selector,
    authors: scraper::Selector,
    abstract_text: scraper::Selector,
}

impl EntrySelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            abstract_link: selector("a[title=Abstract]")?,
            title: selector("div.list-title")?,
            authors: selector("div.list-authors")?,
            abstract_text: selector("p.mathjax")?,
        })
    }

    fn entry_id(&self, dt: ElementRef<'_>) -> Option<String> {
        let raw = dt
            .value()
            .attr("id")
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                let link = first(dt, &self.abstract_link)?;
                link.value()
                    .attr("id")
                    .or_else(|| link.value().attr("href"))
                    .map(str::to_string)
            })?;
        // Ids show up as "arXiv:2403.12345" or "/abs/2403.12345".
        raw.rsplit(|c: char| c == ':' || c == '/')
            .next()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }

    fn entry(&self, id: Option<String>, dd: ElementRef<'_>) -> Option<RawEntry> {
        Some(RawEntry {
            id: id?,
            title: first(dd, &self.title).map(|el| strip_label(&element_text(el), "Title:"))?,
            authors: first(dd, &self.authors).map(|el| strip_label(&element_text(el), "Authors:")),
            abstract_text: first_text(dd, &self.abstract_text),
        })
    }
}

struct RawEntry {
    id: String,
    title: String,
    authors: Option<String>,
    abstract_text: Option<String>,
}

impl RawEntry {
    fn into_article(self, fetched_at: DateTime<Utc>) -> Option<Article> {
        let summary = compose_summary(
            &[
                self.authors.filter(|a| !a.is_empty()).map(|a| format!("Authors: {}", a)),
                self.abstract_text,
            ],
            "",
        );
        Article::new(
            self.title,
            summary,
            format!("https://arxiv.org/abs/{}", self.id),
            Source::Arxiv,
            fetched_at,
        )
    }
}

#[async_trait]
impl Scraper for ArxivScraper {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    fn url(&self) -> &str {
        self.listing.url().as_str()
    }

    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>> {
        let (html, fetched_at) = self.listing.fetch(log).await?;
        Self::parse_listing(&html, self.listing.url(), fetched_at, log)
    }
}
