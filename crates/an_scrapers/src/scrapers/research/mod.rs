//! Journals, preprint servers and paper indexes.

pub mod arxiv;
pub mod jair;
pub mod nature;
pub mod paperswithcode;

pub use arxiv::ArxivScraper;
pub use jair::JairScraper;
pub use nature::NatureScraper;
pub use paperswithcode::PapersWithCodeScraper;
