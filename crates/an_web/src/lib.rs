use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Builds the CORS policy. A `*` entry allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/articles", get(handlers::list_articles))
        .route("/articles/", get(handlers::list_articles))
        .route("/sources", get(handlers::list_sources))
        .route("/sources/", get(handlers::list_sources))
        .route("/refresh-articles", post(handlers::refresh_articles))
        .route("/refresh-articles/", post(handlers::refresh_articles))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(cors_layer(cors_origins)))
        .with_state(state)
}
