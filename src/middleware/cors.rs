//! CORS policy for browser clients.
//!
//! Note:
//! - CORS is enforced by browsers. Native apps and server-to-server calls are not
//!   restricted by it.
//! - Applied at the Router level (not inside handlers).
//!
//! Policy:
//! - Origins: exact-match allowlist from `Config::allowed_origins`. A `*` entry
//!   allows any origin by echoing the request's Origin back (a literal `*` is not
//!   valid together with credentials).
//! - Credentials allowed, so every other rule must be explicit: request headers are
//!   mirrored back and exposed headers are listed.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::Config;

pub const ANY_ORIGIN: &str = "*";

fn allow_origin(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == ANY_ORIGIN) {
        tracing::warn!("ALLOWED_ORIGINS contains `*`, every origin is allowed");
        return AllowOrigin::mirror_request();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    AllowOrigin::list(allowed)
}

pub fn layer(config: &Config) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin(&config.allowed_origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // `Any` is rejected by tower-http together with credentials
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::CONTENT_DISPOSITION,
            header::CACHE_CONTROL,
            header::ETAG,
            header::LAST_MODIFIED,
            HeaderName::from_static("x-request-id"),
        ])
}

/// Apply the CORS policy to the given Router.
pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config))
}
