//! Unified API router for SchemaSense
//!
//! | Prefix                       | Module         | Description                         |
//! |------------------------------|----------------|-------------------------------------|
//! | `/health`                    | api            | Health probe                        |
//! | `/api/v1/classification/*`   | classification | Sessions, review queue, reviews     |

use crate::classification::handler::{classification_router, ClassificationState};
use axum::{
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete SchemaSense HTTP application
pub fn build_app(state: ClassificationState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(classification_router(state))
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(parsed)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaSenseConfig;
    use crate::engine::ClassificationEngine;
    use crate::session::store::MemoryResultStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_app(origins: &[String]) -> Router {
        let engine = ClassificationEngine::new(
            SchemaSenseConfig::default(),
            None,
            Arc::new(MemoryResultStore::new()),
        )
        .unwrap();
        build_app(
            ClassificationState {
                engine: Arc::new(engine),
            },
            origins,
        )
    }

    #[tokio::test]
    async fn test_health() {
        let resp = make_app(&[])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_classification_routes_mounted() {
        let resp = make_app(&["http://localhost:3000".to_string()])
            .oneshot(
                Request::builder()
                    .uri("/api/v1/classification/sessions/unknown")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }
}
