//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket session at `/ws` (optional `?language=`)
/// - API under `/api/v1/...`
/// - Static chat UI from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/achievements", get(http::http_get_achievements))
        .route("/api/v1/translate", post(http::http_post_translate))
        .route("/api/v1/export", post(http::http_post_export))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::state::test_state;

    async fn json_of(router: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn router() -> Router {
        build_router(Arc::new(test_state()))
    }

    #[tokio::test]
    async fn health_is_ok() {
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, body) = json_of(router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn achievements_are_listed_per_language() {
        let req = Request::get("/api/v1/achievements?language=en").body(Body::empty()).unwrap();
        let (status, body) = json_of(router(), req).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert!(list.iter().any(|a| a["id"] == "streak_3" && a["title"] == "Three in a row"));
    }

    #[tokio::test]
    async fn translate_without_client_echoes() {
        let req = Request::post("/api/v1/translate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"Hello","language":"zh"}"#))
            .unwrap();
        let (status, body) = json_of(router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["translation"], "Hello");
    }

    #[tokio::test]
    async fn export_is_accepted() {
        let req = Request::post("/api/v1/export")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Ana","email":"a@b.c","institution":"Uni","score":300}"#))
            .unwrap();
        let (status, body) = json_of(router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }
}
