pub mod error;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use storage::{ArticleStorage, ArticleTransaction};
pub use types::{Article, ArticleQuery, RefreshSummary, Source, StoredArticle};
