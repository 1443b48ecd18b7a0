use an_core::Result;
use clap::{Args, Subcommand};

use crate::manager::{IngestReport, ScraperManager};

#[derive(Args, Debug)]
pub struct ScraperArgs {
    #[command(subcommand)]
    pub command: ScraperCommands,
}

#[derive(Subcommand, Debug)]
pub enum ScraperCommands {
    /// Scrape sources and print what was found, without storing anything
    Run {
        /// Source to scrape (e.g. arxiv, huggingface); all sources when omitted
        source: Option<String>,
    },
    /// List available scrapers
    List,
}

pub async fn handle_command(args: ScraperArgs, manager: &ScraperManager) -> Result<()> {
    match args.command {
        ScraperCommands::Run { source } => {
            let report = match source {
                Some(name) => manager.fetch_source(&name).await?,
                None => manager.fetch_all().await,
            };
            print_report(&report);
        }
        ScraperCommands::List => {
            println!("Available scrapers:");
            for scraper in manager.scrapers() {
                println!(
                    "  {:<16} {} ({})",
                    scraper.cli_names().join(", "),
                    scraper.source(),
                    scraper.url()
                );
            }
        }
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    for article in &report.articles {
        println!(
            "🆕 [{}] {} - {} ({})",
            article.source,
            article.title,
            article.link,
            article.publication_date.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    for source in &report.sources {
        match &source.error {
            Some(error) => println!("❌ {}: {}", source.source, error),
            None => println!(
                "✅ {}: {} articles, {} undated",
                source.source, source.count, source.date_fallbacks
            ),
        }
    }
    println!("Found {} articles", report.articles.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ScraperArgs,
    }

    #[test]
    fn test_parse_run_with_source() {
        let cli = TestCli::parse_from(["test", "run", "jair"]);
        assert!(matches!(
            cli.args.command,
            ScraperCommands::Run { source: Some(ref s) } if s == "jair"
        ));

        let cli = TestCli::parse_from(["test", "run"]);
        assert!(matches!(cli.args.command, ScraperCommands::Run { source: None }));

        let cli = TestCli::parse_from(["test", "list"]);
        assert!(matches!(cli.args.command, ScraperCommands::List));
    }

    #[tokio::test]
    async fn test_unknown_source_is_an_error() {
        let manager = ScraperManager::with_scrapers(Vec::new());
        let args = ScraperArgs {
            command: ScraperCommands::Run { source: Some("reddit".to_string()) },
        };
        assert!(handle_command(args, &manager).await.is_err());
    }
}
