use an_core::{Article, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::dates::{DateResolver, DateToken};
use crate::logging::Logger;
use crate::scrapers::utils::{
    absolute_url, clean_text, compose_summary, element_text, first, first_text, selector,
};
use crate::scrapers::{Listing, Scraper, ScraperConfig};

/// Posts younger than this are preferred.
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;
/// How many posts to keep when nothing is fresh.
pub const FALLBACK_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct HuggingFaceScraper {
    listing: Listing,
}

impl HuggingFaceScraper {
    const BASE_URL: &'static str = "https://huggingface.co/blog";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_url(config, Self::BASE_URL)
    }

    pub fn with_url(config: &ScraperConfig, url: &str) -> Result<Self> {
        Ok(Self {
            listing: Listing::new(config, url, true)?,
        })
    }

    /// Parses community and featured cards, then keeps only fresh posts.
    pub fn parse_listing(
        html: &str,
        page_url: &Url,
        fetched_at: DateTime<Utc>,
        log: &Logger,
    ) -> Result<Vec<Article>> {
        let document = Html::parse_document(html);
        let selectors = CardSelectors::new()?;
        let resolver = DateResolver::new(fetched_at);

        let mut raw_cards = Vec::new();
        for card in document.select(&selectors.community) {
            match selectors.community_card(card, page_url, &resolver) {
                Some(raw) => raw_cards.push(raw),
                None => log.debug("Skipping community card without title or link"),
            }
        }
        for card in document.select(&selectors.featured) {
            match selectors.featured_card(card, page_url) {
                Some(raw) => raw_cards.push(raw),
                None => log.debug("Skipping featured card without title or link"),
            }
        }

        let articles: Vec<Article> = raw_cards
            .into_iter()
            .filter_map(|raw| {
                let token = raw.date_text.as_deref().map_or(DateToken::Missing, DateToken::Text);
                let publication_date = resolver.resolve(token, log);
                raw.into_article(publication_date)
            })
            .collect();

        let total = articles.len();
        let selected = select_fresh(articles, fetched_at);
        log.info(&format!("🤗 Kept {} of {} Hugging Face posts", selected.len(), total));
        Ok(selected)
    }
}

/// Keeps posts published within the freshness window of `fetched_at`. When
/// none qualify, returns the [`FALLBACK_COUNT`] most recent, newest first.
pub fn select_fresh(articles: Vec<Article>, fetched_at: DateTime<Utc>) -> Vec<Article> {
    let window = Duration::hours(FRESHNESS_WINDOW_HOURS);
    let (fresh, mut stale): (Vec<Article>, Vec<Article>) = articles
        .into_iter()
        .partition(|article| fetched_at.signed_duration_since(article.publication_date) <= window);

    if !fresh.is_empty() {
        return fresh;
    }
    stale.sort_by(|a, b| b.publication_date.cmp(&a.publication_date));
    stale.truncate(FALLBACK_COUNT);
    stale
}

struct CardSelectors {
    community: Selector,
    community_title: Selector,
    community_author: Selector,
    likes: Selector,
    featured: Selector,
    featured_title: Selector,
    featured_meta: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            community: selector("div.flex[role=article]")?,
            community_title: selector("a.text-lg")?,
            community_author: selector(r#"a[class~="hover:underline"]"#)?,
            likes: selector("span.ml-1")?,
            featured: selector("article.flex")?,
            featured_title: selector("a.text-2xl")?,
            featured_meta: selector("div.text-sm")?,
        })
    }

    /// The date is the first text fragment outside the title link that resolves.
    fn community_card(
        &self,
        card: ElementRef<'_>,
        page_url: &Url,
        resolver: &DateResolver,
    ) -> Option<RawCard> {
        let title_link = first(card, &self.community_title)?;
        let date_text = card
            .descendants()
            .filter(|node| !node.ancestors().any(|ancestor| ancestor.id() == title_link.id()))
            .filter_map(|node| node.value().as_text().map(|text| clean_text(Some(&**text))))
            .filter(|fragment| !fragment.is_empty())
            .find(|fragment| resolver.try_resolve(DateToken::Text(fragment.as_str())).is_some());

        Some(RawCard {
            title: element_text(title_link),
            link: absolute_url(page_url, title_link.value().attr("href")?)?,
            author: first_text(card, &self.community_author),
            date_text,
            likes: first_text(card, &self.likes),
        })
    }

    fn featured_card(&self, card: ElementRef<'_>, page_url: &Url) -> Option<RawCard> {
        let title_link = first(card, &self.featured_title)?;
        let meta = first_text(card, &self.featured_meta);
        let mut parts = meta
            .as_deref()
            .map(|m| m.split('•').map(str::trim).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        let (author, date_text) = match (parts.next(), parts.next()) {
            (Some(author), Some(date)) => {
                let author = author.strip_prefix("By").unwrap_or(author).trim();
                ((!author.is_empty()).then(|| author.to_string()), Some(date.to_string()))
            }
            _ => (None, None),
        };

        Some(RawCard {
            title: element_text(title_link),
            link: absolute_url(page_url, title_link.value().attr("href")?)?,
            author,
            date_text,
            likes: None,
        })
    }
}

struct RawCard {
    title: String,
    link: String,
    author: Option<String>,
    date_text: Option<String>,
    likes: Option<String>,
}

impl RawCard {
    fn into_article(self, publication_date: DateTime<Utc>) -> Option<Article> {
        let summary = compose_summary(
            &[
                self.author.map(|a| format!("By {}", a)),
                self.likes.map(|l| format!("❤️ {}", l)),
            ],
            "No details available",
        );
        Article::new(self.title, summary, self.link, Source::HuggingFace, publication_date)
    }
}

#[async_trait]
impl Scraper for HuggingFaceScraper {
    fn source(&self) -> Source {
        Source::HuggingFace
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

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 15, 30, 0).unwrap()
    }

    fn page_url() -> Url {
        Url::parse(HuggingFaceScraper::BASE_URL).unwrap()
    }

    fn article(title: &str, days_old: i64) -> Article {
        Article::new(
            title,
            "",
            format!("https://huggingface.co/blog/{}", title),
            Source::HuggingFace,
            fetched_at() - Duration::days(days_old),
        )
        .unwrap()
    }

    const BLOG: &str = r#"
        <div class="grid">
          <div class="flex flex-col" role="article">
            <a class="text-lg font-semibold" href="/blog/community/tiny-agents">Tiny   Agents</a>
            <div><a class="hover:underline text-gray-700" href="/ada">ada</a>
                 <span>about 2 hours ago</span></div>
            <span class="ml-1">42</span>
          </div>
          <div class="flex" role="article">
            <a class="text-lg" href="/blog/community/old-news">Old news</a>
            <span>3 days ago</span>
          </div>
          <div class="flex" role="article">
            <span>no title link</span>
          </div>
        </div>
        <article class="flex flex-col">
          <a class="text-2xl" href="/blog/featured-release">Featured Release</a>
          <div class="text-sm">By Grace Hopper • March 20, 2024</div>
        </article>
    "#;

    #[test]
    fn test_parse_keeps_fresh_cards() {
        let log = Logger::new();
        let articles =
            HuggingFaceScraper::parse_listing(BLOG, &page_url(), fetched_at(), &log).unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Tiny Agents");
        assert_eq!(articles[0].link, "https://huggingface.co/blog/community/tiny-agents");
        assert_eq!(articles[0].summary, "By ada | ❤️ 42");
        assert_eq!(articles[0].publication_date, fetched_at() - Duration::hours(2));

        assert_eq!(articles[1].title, "Featured Release");
        assert_eq!(articles[1].summary, "By Grace Hopper");
        assert_eq!(
            articles[1].publication_date,
            Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()
        );
        assert_eq!(log.data_quality_count(), 0);
    }

    #[test]
    fn test_title_words_are_not_dates() {
        let log = Logger::new();
        let html = r#"
            <div class="flex" role="article">
              <a class="text-lg" href="/blog/community/chicago">Chicago meetup recap</a>
              <span>5 days ago</span>
            </div>
            <div class="flex" role="article">
              <a class="text-lg" href="/blog/community/rlhf">All about RLHF</a>
              <span>6 days ago</span>
            </div>
            <div class="flex" role="article">
              <a class="text-lg" href="/blog/community/now">Just now: a release</a>
              <span>8 days ago</span>
            </div>
            <div class="flex" role="article">
              <a class="text-lg" href="/blog/community/older">Older post</a>
              <span>9 days ago</span>
            </div>
        "#;

        let articles =
            HuggingFaceScraper::parse_listing(html, &page_url(), fetched_at(), &log).unwrap();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Chicago meetup recap", "All about RLHF", "Just now: a release"]);
        assert_eq!(
            articles[0].publication_date,
            Utc.with_ymd_and_hms(2024, 3, 15, 15, 30, 0).unwrap()
        );
        assert_eq!(articles[1].publication_date, fetched_at() - Duration::days(6));
        assert_eq!(articles[2].publication_date, fetched_at() - Duration::days(8));
        assert_eq!(log.data_quality_count(), 0);
    }

    #[test]
    fn test_stale_page_falls_back_to_three_newest() {
        let articles = vec![
            article("e", 9),
            article("b", 3),
            article("d", 7),
            article("a", 2),
            article("c", 5),
        ];

        let selected = select_fresh(articles, fetched_at());
        let titles: Vec<&str> = selected.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(selected.windows(2).all(|w| w[0].publication_date >= w[1].publication_date));
    }

    #[test]
    fn test_fresh_posts_win_over_fallback() {
        let mut articles = vec![article("old", 4), article("older", 6)];
        let mut newest = article("new", 0);
        newest.publication_date = fetched_at() - Duration::hours(24);
        articles.push(newest);

        let selected = select_fresh(articles, fetched_at());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].title, "new");
    }

    #[test]
    fn test_card_without_metadata() {
        let log = Logger::new();
        let html = r#"<article class="flex"><a class="text-2xl" href="/blog/x">X</a></article>"#;
        let articles =
            HuggingFaceScraper::parse_listing(html, &page_url(), fetched_at(), &log).unwrap();
        assert_eq!(articles[0].summary, "No details available");
        assert_eq!(articles[0].publication_date, fetched_at());
        assert_eq!(log.data_quality_count(), 1);
    }
}
