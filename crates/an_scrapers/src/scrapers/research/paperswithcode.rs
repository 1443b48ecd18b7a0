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
pub struct PapersWithCodeScraper {
    listing: Listing,
}

impl PapersWithCodeScraper {
    const BASE_URL: &'static str = "https://paperswithcode.com/latest";

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
        let selectors = CardSelectors::new()?;
        let resolver = DateResolver::new(fetched_at);

        let cards: Vec<ElementRef<'_>> = document.select(&selectors.card).collect();
        log.debug(&format!("Found {} paper cards", cards.len()));

        let articles: Vec<Article> = cards
            .into_iter()
            .filter_map(|card| {
                let article = selectors
                    .extract(card, page_url)
                    .and_then(|raw| raw.into_article(&resolver, log));
                if article.is_none() {
                    log.debug("Skipping paper card without title or link");
                }
                article
            })
            .collect();

        log.info(&format!("📚 Parsed {} Papers with Code entries", articles.len()));
        Ok(articles)
    }
}

struct CardSelectors {
    card: Selector,
    title_links: [Selector; 2],
    abstracts: [Selector; 2],
    date: Selector,
    stars: Selector,
    meta_date: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: selector("div.paper-card")?,
            title_links: [selector("h1 a")?, selector("h4 a")?],
            abstracts: [selector("p.paper-abstract")?, selector("p.item-strip-abstract")?],
            date: selector(concat!(
                "span.date-published, span.item-date, span.date, ",
                "div.date-published, div.item-date, div.date",
            ))?,
            stars: selector("span.github-stars")?,
            meta_date: selector("meta[name=citation_publication_date]")?,
        })
    }

    fn extract(&self, card: ElementRef<'_>, page_url: &Url) -> Option<RawCard> {
        let title_link = self.title_links.iter().find_map(|sel| first(card, sel))?;
        let link = absolute_url(page_url, title_link.value().attr("href")?)?;

        Some(RawCard {
            title: element_text(title_link),
            link,
            abstract_text: self.abstracts.iter().find_map(|sel| first_text(card, sel)),
            visible_date: first(card, &self.date).map(element_text),
            meta_date: first(card, &self.meta_date)
                .and_then(|meta| meta.value().attr("content"))
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty()),
            stars: first_text(card, &self.stars),
        })
    }
}

struct RawCard {
    title: String,
    link: String,
    abstract_text: Option<String>,
    visible_date: Option<String>,
    meta_date: Option<String>,
    stars: Option<String>,
}

impl RawCard {
    fn into_article(self, resolver: &DateResolver, log: &Logger) -> Option<Article> {
        // The citation metadata wins over whatever the card displays.
        let meta_date = self.meta_date.as_deref().and_then(|content| {
            let resolved = resolver.try_resolve(DateToken::Structured(content)).map(|(at, _)| at);
            if resolved.is_none() {
                log.warn(&format!("⚠️ Ignoring unparsable citation date {:?}", content));
            }
            resolved
        });

        let date_found = meta_date.is_some() || self.visible_date.is_some();
        let publication_date = match (meta_date, self.visible_date.as_deref()) {
            (Some(at), _) => at,
            (None, Some(text)) => resolver.resolve(DateToken::Text(text), log),
            (None, None) => resolver.resolve(DateToken::Missing, log),
        };

        let mut summary = compose_summary(
            &[self.stars.map(|stars| format!("⭐ {}", stars)), self.abstract_text],
            "No summary available",
        );
        if date_found {
            summary = format!(
                "Published: {}\n{}",
                publication_date.format("%Y-%m-%d %H:%M:%S"),
                summary
            );
        }

        Article::new(self.title, summary, self.link, Source::PapersWithCode, publication_date)
    }
}

#[async_trait]
impl Scraper for PapersWithCodeScraper {
    fn source(&self) -> Source {
        Source::PapersWithCode
    }

    fn url(&self) -> &str {
        self.listing.url().as_str()
    }

    async fn scrape(&self, log: &Logger) -> Result<Vec<Article>> {
        let (html, fetched_at) = self.listing.fetch(log).await?;
        Self::parse_listing(&html, self.listing.url(), fetched_at, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const LATEST: &str = r#"
        <html><body>
        <div class="infinite-container">
          <div class="row paper-card">
            <h1><a href="/paper/sparse-mixtures">Sparse   Mixtures of Experts</a></h1>
            <p class="item-strip-abstract">We route tokens.</p>
            <span class="author-name-text item-date-pub">ignored</span>
            <span class="item-date">3 days ago</span>
            <span class="github-stars">1,204</span>
          </div>
          <div class="row paper-card">
            <h4><a href="/paper/graph-nets">Graph Nets</a></h4>
            <p class="paper-abstract">Message passing.</p>
            <div class="date">15 Mar 2024</div>
            <meta name="citation_publication_date" content="2024-03-10">
          </div>
          <div class="row paper-card">
            <h1><a href="/paper/no-date">Undated Paper</a></h1>
          </div>
          <div class="row paper-card">
            <h1>Title without a link</h1>
          </div>
        </div>
        </body></html>
    "#;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 15, 30, 0).unwrap()
    }

    fn page_url() -> Url {
        Url::parse(PapersWithCodeScraper::BASE_URL).unwrap()
    }

    #[test]
    fn test_parse_latest() {
        let log = Logger::new();
        let articles =
            PapersWithCodeScraper::parse_listing(LATEST, &page_url(), fetched_at(), &log).unwrap();
        assert_eq!(articles.len(), 3);

        let sparse = &articles[0];
        assert_eq!(sparse.title, "Sparse Mixtures of Experts");
        assert_eq!(sparse.link, "https://paperswithcode.com/paper/sparse-mixtures");
        assert_eq!(sparse.publication_date, fetched_at() - Duration::days(3));
        assert_eq!(
            sparse.summary,
            "Published: 2024-03-17 15:30:00\n⭐ 1,204 | We route tokens."
        );

        let graph = &articles[1];
        assert_eq!(graph.publication_date, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(graph.summary, "Published: 2024-03-10 00:00:00\nMessage passing.");

        let undated = &articles[2];
        assert_eq!(undated.summary, "No summary available");
        assert_eq!(undated.publication_date, fetched_at());
        assert_eq!(log.data_quality_count(), 1);
        assert!(articles.iter().all(|a| a.source == Source::PapersWithCode));
    }

    #[test]
    fn test_unparsable_meta_keeps_visible_date() {
        let log = Logger::new();
        let html = r#"<div class="paper-card"><h1><a href="/paper/x">X</a></h1>
            <span class="date">2024-03-01</span>
            <meta name="citation_publication_date" content="unknown"></div>"#;
        let articles =
            PapersWithCodeScraper::parse_listing(html, &page_url(), fetched_at(), &log).unwrap();
        assert_eq!(
            articles[0].publication_date,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(log.data_quality_count(), 0);
    }
}
