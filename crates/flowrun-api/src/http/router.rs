//! Axum router configuration with middleware.
//!
//! REST routes are under `/api/v1/`, the live run socket at `/ws/flow-run`.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/runs",
            post(handlers::run::create_run).get(handlers::run::list_runs),
        )
        .route("/runs/{id}", get(handlers::run::get_run))
        .route("/flows/{flow_id}/runs", get(handlers::run::list_flow_runs));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws/flow-run", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found(uri: axum::http::Uri) -> ApiResponse<()> {
    ApiResponse::error("ROUTE_NOT_FOUND", &format!("No route for {uri}"))
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[tokio::test]
    async fn test_health_reports_version() {
        let axum::Json(body) = health_check().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let resp = not_found("/nope".parse().unwrap()).await.into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
