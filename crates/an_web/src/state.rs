use std::sync::Arc;

use an_core::ArticleStorage;
use an_scrapers::ScraperManager;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ArticleStorage>,
    pub manager: Arc<ScraperManager>,
}

impl AppState {
    pub fn new(storage: Arc<dyn ArticleStorage>, manager: ScraperManager) -> Self {
        Self {
            storage,
            manager: Arc::new(manager),
        }
    }
}
