/*
 * Responsibility
 * - GET /           welcome message
 * - GET /health     liveness check (never touches the database)
 * - GET /cors-test  diagnostic echo for checking CORS from a browser
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({"message": "Welcome to ImmigrantJobFinder API"}))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

pub async fn cors_test() -> impl IntoResponse {
    Json(json!({
        "message": "CORS is working",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
