use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Structured event sink scoped to one ingestion run.
///
/// Prefixes identify the run and the source being processed. Clones made with
/// [`Logger::with_prefix`] get their own data-quality counter, so each source
/// reports how many dates it had to guess.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: VecDeque<String>,
    data_quality: Arc<AtomicUsize>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_new_prefixes(mut self, prefix: String) -> Self {
        self.prefixes.clear();
        self.prefixes.push_back(prefix);
        self
    }

    /// Child logger with one more prefix and a fresh data-quality counter.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let mut prefixes = self.prefixes.clone();
        prefixes.push_back(prefix.into());
        Self {
            prefixes,
            data_quality: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn scope(&self) -> String {
        self.prefixes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    pub fn info(&self, message: &str) {
        tracing::info!(scope = %self.scope(), "{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(scope = %self.scope(), "{}", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(scope = %self.scope(), "{}", message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(scope = %self.scope(), "{}", message);
    }

    /// Records a non-fatal problem with scraped data.
    pub fn data_quality(&self, field: &str, raw: &str, message: &str) {
        self.data_quality.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(scope = %self.scope(), field, raw, "{}", message);
    }

    pub fn data_quality_count(&self) -> usize {
        self.data_quality.load(Ordering::Relaxed)
    }
}

/// Installs the global `tracing` subscriber once. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging() -> Logger {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        });
    }
    Logger::new()
}
