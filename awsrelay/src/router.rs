//! HTTP routers for the relay and its dashboard

use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use awsrelay_sqs::{LifecycleStore, ProxyState};

use crate::dashboard;

/// Relay router: every path and method goes upstream
pub fn create_proxy_router(state: Arc<ProxyState>) -> Router {
    awsrelay_sqs::router(state).layer(TraceLayer::new_for_http())
}

/// Dashboard router: static page plus the JSON read API
pub fn create_dashboard_router(store: Arc<LifecycleStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(dashboard::index))
        .route("/health", get(health_check))
        .route("/api/stats", get(dashboard::stats))
        .route("/api/messages", get(dashboard::messages))
        .route("/api/history", get(dashboard::history))
        .route("/api/clear", post(dashboard::clear).delete(dashboard::clear))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"status": "running"}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const Q1_URL: &str = "http://localhost:4566/000000000000/q1";

    fn seeded_store() -> Arc<LifecycleStore> {
        let store = Arc::new(LifecycleStore::new());
        store.record_send(Q1_URL, "q1", "m1", "one", HashMap::new());
        store.record_send(Q1_URL, "q1", "m2", "two", HashMap::new());
        store.record_receive(Q1_URL, "q1", "m1", "rh1", "one", HashMap::new());
        store.record_delete(Q1_URL, "q1", "rh1");
        store
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> Value {
        let (status, body) = call(app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let app = create_dashboard_router(seeded_store());
        let (status, body) = call(app, Method::GET, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("<html"));
    }

    #[tokio::test]
    async fn test_stats() {
        let app = create_dashboard_router(seeded_store());
        let stats = get_json(app, "/api/stats").await;

        assert_eq!(stats[0]["queueName"], "q1");
        assert_eq!(stats[0]["queueUrl"], Q1_URL);
        assert_eq!(stats[0]["totalSent"], 2);
        assert_eq!(stats[0]["totalReceived"], 1);
        assert_eq!(stats[0]["totalDeleted"], 1);
        assert_eq!(stats[0]["pending"], 1);
    }

    #[tokio::test]
    async fn test_messages_filters() {
        let store = seeded_store();

        let live = get_json(create_dashboard_router(store.clone()), "/api/messages?queue=q1").await;
        assert_eq!(live.as_array().unwrap().len(), 1);
        assert_eq!(live[0]["messageId"], "m2");

        let all = get_json(
            create_dashboard_router(store.clone()),
            "/api/messages?queue=q1&deleted=true",
        )
        .await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let other = get_json(create_dashboard_router(store), "/api/messages?queue=nope").await;
        assert!(other.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_limit_and_order() {
        let store = seeded_store();

        let all = get_json(create_dashboard_router(store.clone()), "/api/history").await;
        assert_eq!(all.as_array().unwrap().len(), 4);
        assert_eq!(all[0]["action"], "delete");
        assert_eq!(all[3]["action"], "send");

        let two = get_json(create_dashboard_router(store.clone()), "/api/history?limit=2").await;
        assert_eq!(two.as_array().unwrap().len(), 2);

        let everything = get_json(create_dashboard_router(store), "/api/history?limit=-1").await;
        assert_eq!(everything.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = seeded_store();

        let (status, body) = call(
            create_dashboard_router(store.clone()),
            Method::POST,
            "/api/clear",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "cleared");

        assert!(get_json(create_dashboard_router(store.clone()), "/api/stats")
            .await
            .as_array()
            .unwrap()
            .is_empty());
        assert!(get_json(create_dashboard_router(store.clone()), "/api/messages?deleted=true")
            .await
            .as_array()
            .unwrap()
            .is_empty());
        assert!(get_json(create_dashboard_router(store), "/api/history?limit=0")
            .await
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_clear_with_delete_method() {
        let store = seeded_store();
        let (status, _) = call(
            create_dashboard_router(store.clone()),
            Method::DELETE,
            "/api/clear",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test]
    async fn test_clear_rejects_get() {
        let store = seeded_store();
        let (status, _) = call(create_dashboard_router(store.clone()), Method::GET, "/api/clear").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(store.history_len(), 4);
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let app = create_dashboard_router(seeded_store());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_dashboard_router(seeded_store());
        let health = get_json(app, "/health").await;
        assert_eq!(health["status"], "running");
    }
}
