pub mod cli;
pub mod dates;
pub mod logging;
pub mod manager;
pub mod scrapers;

pub use cli::{handle_command, ScraperArgs, ScraperCommands};
pub use logging::{init_logging, Logger};
pub use manager::{IngestReport, ScraperManager, SourceReport};
pub use scrapers::{Scraper, ScraperConfig, ScraperType};

