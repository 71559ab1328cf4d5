//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id), also on error responses
//! - Access logging / request tracing (TraceLayer)
//! - Body size limit and per-request timeout from `HttpConfig`
//!
//! WebSocket upgrades pass through the timeout as well: the upgrade response is
//! returned immediately and the socket itself runs outside the request future.

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::header::HeaderName;
use tower::timeout::{TimeoutLayer, error::Elapsed};
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::error::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

async fn handle_layer_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        tracing::warn!("request timed out");
        return AppError::Timeout;
    }
    tracing::error!(error = %err, "unhandled middleware error");
    AppError::Internal
}

pub fn apply(router: Router, config: &HttpConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    // Outermost first: the request id wraps everything so that timeouts and
    // rejected bodies still answer with it.
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(TraceLayer::new_for_http())
        .layer(HandleErrorLayer::new(handle_layer_error))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes));

    router.layer(layers)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        routing::{get, post},
    };
    use tower::ServiceExt;

    use super::*;

    fn app(config: &HttpConfig) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            )
            .route("/echo", post(|body: String| async move { body }));
        apply(router, config)
    }

    #[tokio::test]
    async fn request_id_is_generated_and_returned() {
        let res = app(&HttpConfig::default())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn incoming_request_id_is_propagated() {
        let res = app(&HttpConfig::default())
            .oneshot(
                Request::get("/")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.headers()[REQUEST_ID_HEADER], "req-123");
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timeout_answers_408_with_request_id() {
        let config = HttpConfig {
            request_timeout: Duration::from_secs(1),
            ..HttpConfig::default()
        };

        let res = app(&config)
            .oneshot(
                Request::get("/slow")
                    .header(REQUEST_ID_HEADER, "req-slow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(res.headers()[REQUEST_ID_HEADER], "req-slow");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "REQUEST_TIMEOUT");
    }

    #[tokio::test]
    async fn configured_body_limit_rejects_larger_payloads() {
        let config = HttpConfig {
            body_limit_bytes: 16,
            ..HttpConfig::default()
        };

        let small = app(&config)
            .oneshot(
                Request::post("/echo")
                    .header(header::CONTENT_LENGTH, "5")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(small.status(), StatusCode::OK);

        let payload = "x".repeat(17);
        let large = app(&config)
            .oneshot(
                Request::post("/echo")
                    .header(header::CONTENT_LENGTH, payload.len().to_string())
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
