//! Publication date resolution.
//!
//! Scraped pages express dates as ISO attributes, relative phrases
//! ("3 days ago", "about 2 hours ago", "just now") or one of a few human
//! formats. Everything resolves to UTC; anything unrecognised resolves to the
//! instant the page was fetched and is reported as a data-quality issue.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::logging::Logger;
use crate::scrapers::utils::clean_text;

lazy_static! {
    static ref RELATIVE: Regex =
        Regex::new(r"(?i)^[^\w]*(\d+)\s+(minute|min|hour|day)s?\s+ago\b").unwrap();
    static ref ABOUT_HOURS: Regex =
        Regex::new(r"(?i)^[^\w]*about\s+(\d+|an?)\s+hours?\s+ago\b").unwrap();
    static ref JUST_NOW: Regex = Regex::new(r"(?i)\bjust now\b").unwrap();
}

/// Human formats, tried in this order.
pub const ABSOLUTE_FORMATS: [&str; 3] = ["%d %b %Y", "%Y-%m-%d", "%B %d, %Y"];

const STRUCTURED_WITH_OFFSET: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const STRUCTURED_NAIVE: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken<'a> {
    /// Machine-readable attribute such as `<time datetime="...">`.
    Structured(&'a str),
    /// Visible page text.
    Text(&'a str),
    Missing,
}

/// Which rule produced a resolved date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    Structured,
    Relative,
    AboutHours,
    JustNow,
    Absolute(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    fetched_at: DateTime<Utc>,
}

impl DateResolver {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self { fetched_at }
    }

    /// Resolves a token, falling back to the fetch instant.
    pub fn resolve(&self, token: DateToken<'_>, log: &Logger) -> DateTime<Utc> {
        match self.try_resolve(token) {
            Some((at, _)) => at,
            None => {
                let raw = match token {
                    DateToken::Structured(raw) | DateToken::Text(raw) => raw,
                    DateToken::Missing => "",
                };
                log.data_quality("publication_date", raw, "unresolved date, using fetch time");
                self.fetched_at
            }
        }
    }

    pub fn try_resolve(&self, token: DateToken<'_>) -> Option<(DateTime<Utc>, DateRule)> {
        match token {
            DateToken::Structured(raw) => parse_structured(raw.trim())
                .map(|at| (at, DateRule::Structured))
                .or_else(|| self.parse_text(raw)),
            DateToken::Text(raw) => self.parse_text(raw),
            DateToken::Missing => None,
        }
    }

    fn parse_text(&self, raw: &str) -> Option<(DateTime<Utc>, DateRule)> {
        let text = clean_text(Some(raw));
        if text.is_empty() {
            return None;
        }

        if let Some(caps) = RELATIVE.captures(&text) {
            let amount: i64 = caps[1].parse().ok()?;
            let unit = caps[2].to_ascii_lowercase();
            let span = match unit.as_str() {
                "minute" | "min" => Duration::try_minutes(amount),
                "hour" => Duration::try_hours(amount),
                _ => Duration::try_days(amount),
            }?;
            return self
                .fetched_at
                .checked_sub_signed(span)
                .map(|at| (at, DateRule::Relative));
        }

        if let Some(caps) = ABOUT_HOURS.captures(&text) {
            let amount: i64 = match caps[1].to_ascii_lowercase().as_str() {
                "a" | "an" => 1,
                n => n.parse().ok()?,
            };
            return Duration::try_hours(amount)
                .and_then(|span| self.fetched_at.checked_sub_signed(span))
                .map(|at| (at, DateRule::AboutHours));
        }

        if JUST_NOW.is_match(&text) {
            return Some((self.fetched_at, DateRule::JustNow));
        }

        ABSOLUTE_FORMATS.iter().find_map(|format| {
            NaiveDate::parse_from_str(&text, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| (Utc.from_utc_datetime(&naive), DateRule::Absolute(*format)))
        })
    }
}

fn parse_structured(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in STRUCTURED_WITH_OFFSET {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for format in STRUCTURED_NAIVE {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
