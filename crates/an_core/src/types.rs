use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The fixed set of sites articles are collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "arXiv CS.AI")]
    Arxiv,
    #[serde(rename = "Papers with Code")]
    PapersWithCode,
    #[serde(rename = "Journal of AI Research")]
    Jair,
    #[serde(rename = "TechCrunch AI")]
    TechCrunch,
    #[serde(rename = "Nature AI Special")]
    Nature,
    #[serde(rename = "Hugging Face Blog")]
    HuggingFace,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Arxiv,
        Source::PapersWithCode,
        Source::Jair,
        Source::TechCrunch,
        Source::Nature,
        Source::HuggingFace,
    ];

    /// Label stored alongside every article and used by the source filter.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Arxiv => "arXiv CS.AI",
            Source::PapersWithCode => "Papers with Code",
            Source::Jair => "Journal of AI Research",
            Source::TechCrunch => "TechCrunch AI",
            Source::Nature => "Nature AI Special",
            Source::HuggingFace => "Hugging Face Blog",
        }
    }

    /// Short name accepted on the command line.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Source::Arxiv => "arxiv",
            Source::PapersWithCode => "paperswithcode",
            Source::Jair => "jair",
            Source::TechCrunch => "techcrunch",
            Source::Nature => "nature",
            Source::HuggingFace => "huggingface",
        }
    }

    pub fn from_label(label: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Source::ALL
            .into_iter()
            .find(|src| {
                src.label().eq_ignore_ascii_case(wanted)
                    || src.cli_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| Error::Config(format!("Unknown source: {}", s)))
    }
}

/// A normalized article as produced by a scraper.
///
/// Built only through [`Article::new`], so title and link are never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub source: Source,
    pub publication_date: DateTime<Utc>,
}

impl Article {
    /// Returns `None` when the title or link is blank.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        link: impl Into<String>,
        source: Source,
        publication_date: DateTime<Utc>,
    ) -> Option<Self> {
        let title = title.into().trim().to_string();
        let link = link.into().trim().to_string();
        if title.is_empty() || link.is_empty() {
            return None;
        }
        Some(Self {
            title,
            summary: summary.into(),
            link,
            source,
            publication_date,
        })
    }
}

/// An article as persisted, with its surrogate row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub article_id: i64,
    #[serde(flatten)]
    pub article: Article,
}

/// Filter for listing stored articles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleQuery {
    pub since: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl ArticleQuery {
    /// Articles published in the last `hours` hours; `0` means no window.
    pub fn within_hours(hours: i64, now: DateTime<Utc>) -> Self {
        let since = if hours == 0 {
            None
        } else {
            Duration::try_hours(hours).and_then(|window| now.checked_sub_signed(window))
        };
        Self { since, source: None }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        let in_window = self.since.map_or(true, |since| article.publication_date >= since);
        let from_source = self
            .source
            .as_deref()
            .map_or(true, |label| article.source.label() == label);
        in_window && from_source
    }
}

/// Outcome of one refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub message: String,
    pub count: usize,
}

impl RefreshSummary {
    pub fn refreshed(count: usize) -> Self {
        Self {
            message: "Articles refreshed successfully".to_string(),
            count,
        }
    }
}
