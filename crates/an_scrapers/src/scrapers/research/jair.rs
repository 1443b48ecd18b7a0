use an_core::{Article, Error, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::dates::{DateResolver, DateToken};
use crate::logging::Logger;
use crate::scrapers::utils::{
    absolute_url, clean_text, compose_summary, element_text, first, first_text, selector,
    strip_label,
};
use crate::scrapers::{Listing, Scraper, ScraperConfig};

const PUBLISHED_LABEL: &str = "Published:";

#[derive(Debug, Clone)]
pub struct JairScraper {
    listing: Listing,
}

impl JairScraper {
    const BASE_URL: &'static str = "https://www.jair.org/index.php/jair/issue/view/1170";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_url(config, Self::BASE_URL)
    }

    pub fn with_url(config: &ScraperConfig, url: &str) -> Result<Self> {
        Ok(Self {
            listing: Listing::new(config, url, true)?,
        })
    }

    /// Parses an issue table of contents. All entries share the issue date.
    pub fn parse_listing(
        html: &str,
        page_url: &Url,
        fetched_at: DateTime<Utc>,
        log: &Logger,
    ) -> Result<Vec<Article>> {
        let document = Html::parse_document(html);

        let issue_text = issue_date_text(&document)?;
        let token = issue_text.as_deref().map_or(DateToken::Missing, DateToken::Text);
        let issue_date = DateResolver::new(fetched_at).resolve(token, log);
        log.debug(&format!("📅 Issue date {}", issue_date));

        let section = document
            .select(&selector("section.articles")?)
            .next()
            .ok_or_else(|| Error::Scraping("JAIR page has no articles section".to_string()))?;

        let selectors = EntrySelectors::new()?;
        let entries: Vec<ElementRef<'_>> = section.select(&selectors.entry).collect();
        log.debug(&format!("Found {} article entries", entries.len()));

        let articles: Vec<Article> = entries
            .into_iter()
            .filter_map(|entry| match selectors.extract(entry, page_url) {
                Some(raw) => raw.into_article(issue_date),
                None => {
                    log.debug("Skipping JAIR entry without title or link");
                    None
                }
            })
            .collect();

        log.info(&format!("📚 Parsed {} JAIR articles", articles.len()));
        Ok(articles)
    }
}

/// Text of the issue's publication date, if the page shows one.
fn issue_date_text(document: &Html) -> Result<Option<String>> {
    if let Some(value) = document.select(&selector(".published .value")?).next() {
        let text = element_text(value);
        if !text.is_empty() {
            return Ok(Some(text));
        }
    }

    // Fall back to whatever follows a bare "Published:" label.
    for node in document.tree.nodes() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let cleaned = clean_text(Some(&**text));
        let Some(rest) = cleaned.strip_prefix(PUBLISHED_LABEL) else {
            continue;
        };
        if !rest.trim().is_empty() {
            return Ok(Some(rest.trim().to_string()));
        }
        // The label may sit in its own element, e.g. <strong>Published:</strong>.
        let following = node
            .next_siblings()
            .chain(node.parent().into_iter().flat_map(|parent| parent.next_siblings()))
            .find_map(|sibling| {
                let text = match ElementRef::wrap(sibling) {
                    Some(element) => element_text(element),
                    None => clean_text(sibling.value().as_text().map(|t| &**t)),
                };
                (!text.is_empty()).then_some(text)
            });
        if following.is_some() {
            return Ok(following);
        }
    }
    Ok(None)
}

struct EntrySelectors {
    entry: Selector,
    title_link: Selector,
    authors: Selector,
    anchor: Selector,
    pages: Selector,
    pdf: Selector,
}

impl EntrySelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            entry: selector("div.obj_article_summary")?,
            title_link: selector("div.title a")?,
            authors: selector("div.authors")?,
            anchor: selector("a")?,
            pages: selector("div.pages")?,
            pdf: selector("a.pdf")?,
        })
    }

    fn extract(&self, entry: ElementRef<'_>, page_url: &Url) -> Option<RawEntry> {
        let title_link = first(entry, &self.title_link)?;
        let link = absolute_url(page_url, title_link.value().attr("href")?)?;

        let authors = first(entry, &self.authors).map(|div| {
            let names: Vec<String> = div
                .select(&self.anchor)
                .map(element_text)
                .filter(|name| !name.is_empty())
                .collect();
            if names.is_empty() {
                element_text(div)
            } else {
                names.join(", ")
            }
        });

        Some(RawEntry {
            title: element_text(title_link),
            link,
            authors: authors.filter(|a| !a.is_empty()),
            pages: first_text(entry, &self.pages)
                .map(|pages| strip_label(&pages, "Pages:"))
                .filter(|pages| !pages.is_empty()),
            has_pdf: first(entry, &self.pdf)
                .and_then(|a| a.value().attr("href"))
                .is_some(),
        })
    }
}

struct RawEntry {
    title: String,
    link: String,
    authors: Option<String>,
    pages: Option<String>,
    has_pdf: bool,
}

impl RawEntry {
    fn into_article(self, issue_date: DateTime<Utc>) -> Option<Article> {
        let summary = compose_summary(
            &[
                self.authors.map(|a| format!("Authors: {}", a)),
                self.pages.map(|p| format!("Pages: {}", p)),
                self.has_pdf.then(|| "[PDF Available]".to_string()),
            ],
            "No details available",
        );
        Article::new(self.title, summary, self.link, Source::Jair, issue_date)
    }
}

#[async_trait]
impl Scraper for JairScraper {
    fn source(&self) -> Source {
        Source::Jair
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
    use chrono::TimeZone;

    const ISSUE: &str = r#"
        <html><body>
        <div class="heading">
          <div class="published"><span class="label">Published:</span>
            <span class="value">2024-03-15</span></div>
        </div>
        <section class="articles">
          <div class="obj_article_summary">
            <div class="title"><a href="/index.php/jair/article/view/101">
              Planning with   Uncertainty</a></div>
            <div class="meta">
              <div class="authors"><a href="/authors/ada">Ada Lovelace</a><a href="/authors/alan">Alan Turing</a></div>
              <div class="pages">Pages: 1-42</div>
            </div>
            <ul class="galleys_links"><li><a class="obj_galley_link pdf" href="/index.php/jair/article/view/101/pdf">PDF</a></li></ul>
          </div>
          <div class="obj_article_summary">
            <div class="title"><a href="https://www.jair.org/index.php/jair/article/view/102">Bare Entry</a></div>
          </div>
          <div class="obj_article_summary">
            <div class="authors">Grace Hopper</div>
          </div>
          <div class="obj_article_summary">
            <div class="title"><a href="/index.php/jair/article/view/104">Plain Authors</a></div>
            <div class="authors">  Grace
               Hopper </div>
          </div>
        </section>
        </body></html>
    "#;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 15, 30, 0).unwrap()
    }

    fn page_url() -> Url {
        Url::parse(JairScraper::BASE_URL).unwrap()
    }

    #[test]
    fn test_parse_issue() {
        let log = Logger::new();
        let articles = JairScraper::parse_listing(ISSUE, &page_url(), fetched_at(), &log).unwrap();
        let issue_date = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();

        assert_eq!(articles.len(), 3);
        assert!(articles.iter().all(|a| a.publication_date == issue_date));
        assert!(articles.iter().all(|a| a.source == Source::Jair));

        assert_eq!(articles[0].title, "Planning with Uncertainty");
        assert_eq!(articles[0].link, "https://www.jair.org/index.php/jair/article/view/101");
        assert_eq!(
            articles[0].summary,
            "Authors: Ada Lovelace, Alan Turing | Pages: 1-42 | [PDF Available]"
        );

        assert_eq!(articles[1].summary, "No details available");
        assert_eq!(articles[2].summary, "Authors: Grace Hopper");
        assert_eq!(log.data_quality_count(), 0);
    }

    #[test]
    fn test_published_label_fallback() {
        let html = r#"<div><strong>Published:</strong> 2023-11-02</div>
            <section class="articles"></section>"#;
        let document = Html::parse_document(html);
        assert_eq!(issue_date_text(&document).unwrap().as_deref(), Some("2023-11-02"));

        let inline = Html::parse_document("<p>Published: 2023-11-02</p>");
        assert_eq!(issue_date_text(&inline).unwrap().as_deref(), Some("2023-11-02"));
    }

    #[test]
    fn test_missing_issue_date_uses_fetch_time() {
        let log = Logger::new();
        let html = r#"<section class="articles"><div class="obj_article_summary">
            <div class="title"><a href="/a/1">Only</a></div></div></section>"#;
        let articles = JairScraper::parse_listing(html, &page_url(), fetched_at(), &log).unwrap();
        assert_eq!(articles[0].publication_date, fetched_at());
        assert_eq!(log.data_quality_count(), 1);
    }

    #[test]
    fn test_missing_articles_section_fails_the_page() {
        let log = Logger::new();
        let html = "<html><body></body></html>";
        let result = JairScraper::parse_listing(html, &page_url(), fetched_at(), &log);
        assert!(matches!(result, Err(Error::Scraping(_))));
    }
}
