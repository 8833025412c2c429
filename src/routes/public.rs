use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a token and without a rate limit.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /films?page=...
        // The full catalog, or one page of it with a `meta` block.
        .route("/films", get(handlers::list_films))
        // GET /films/{id}
        .route("/films/{id}", get(handlers::get_film))
}
