//! Tech press and company blogs.

pub mod huggingface;
pub mod techcrunch;

pub use huggingface::HuggingFaceScraper;
pub use techcrunch::TechCrunchScraper;
