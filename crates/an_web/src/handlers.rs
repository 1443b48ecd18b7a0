use an_core::{ArticleQuery, Error, RefreshSummary, StoredArticle};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

pub const DEFAULT_TIMEFRAME_HOURS: i64 = 24;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Persistence,
    Refresh(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Persistence => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error saving articles to database".to_string(),
            ),
            ApiError::Refresh(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error refreshing articles: {}", e),
            ),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticleParams {
    /// Hours to look back; `0` returns everything.
    pub timeframe: Option<i64>,
    pub source: Option<String>,
}

pub async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ArticleParams>,
) -> Result<Json<Vec<StoredArticle>>, ApiError> {
    let timeframe = params.timeframe.unwrap_or(DEFAULT_TIMEFRAME_HOURS);
    if timeframe < 0 {
        return Err(ApiError::BadRequest("timeframe must not be negative".to_string()));
    }

    let query = ArticleQuery::within_hours(timeframe, Utc::now()).with_source(params.source);
    let articles = state.storage.list_articles(&query).await?;
    Ok(Json(articles))
}

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.storage.list_sources().await?))
}

pub async fn refresh_articles(
    State(state): State<AppState>,
) -> Result<Json<RefreshSummary>, ApiError> {
    match state.manager.refresh(state.storage.as_ref()).await {
        Ok(summary) => {
            tracing::info!(count = summary.count, "🔄 Refresh finished");
            Ok(Json(summary))
        }
        Err(Error::Storage(e)) => {
            tracing::error!(error = %e, "💾 Refresh could not be saved");
            Err(ApiError::Persistence)
        }
        Err(e) => {
            tracing::error!(error = %e, "❌ Refresh failed");
            Err(ApiError::Refresh(e.to_string()))
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}
