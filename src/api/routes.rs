/*
 * Responsibility
 * - URL structure of the API
 * - Static endpoints (/, /health, /cors-test)
 * - Feature routers nested under /api/<feature>, WebSocket group merged unprefixed
 */
use axum::{Extension, Router, routing::get};

use crate::api::handlers::{
    documents,
    root::{cors_test, health, root},
    ws,
};
use crate::state::AppState;

/// A feature router: where it is mounted, how it is tagged in logs, and the
/// collection it reads from.
#[derive(Debug)]
pub struct Feature {
    pub prefix: &'static str,
    pub tag: &'static str,
    pub collection: &'static str,
    /// Expose `GET /` and `GET /{id}` in addition to `GET /status`.
    pub documents: bool,
}

pub static FEATURES: [Feature; 7] = [
    Feature {
        prefix: "/api/auth",
        tag: "Authentication",
        collection: "users",
        documents: false,
    },
    Feature {
        prefix: "/api/users",
        tag: "Users",
        collection: "users",
        documents: true,
    },
    Feature {
        prefix: "/api/resumes",
        tag: "Resumes",
        collection: "resumes",
        documents: true,
    },
    Feature {
        prefix: "/api/jobs",
        tag: "Jobs",
        collection: "jobs",
        documents: true,
    },
    Feature {
        prefix: "/api/qualifications",
        tag: "Qualifications",
        collection: "qualifications",
        documents: true,
    },
    Feature {
        prefix: "/api/friends",
        tag: "Friends",
        collection: "friends",
        documents: true,
    },
    Feature {
        prefix: "/api/chat",
        tag: "Chat",
        collection: "messages",
        documents: true,
    },
];

pub fn routes() -> Router<AppState> {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/cors-test", get(cors_test));

    for feature in FEATURES.iter() {
        router = router.nest(feature.prefix, feature_routes(feature));
    }

    // WebSocket group has no prefix
    router.route("/ws/{user_id}", get(ws::upgrade))
}

fn feature_routes(feature: &'static Feature) -> Router<AppState> {
    let mut router = Router::new().route("/status", get(documents::status));

    if feature.documents {
        router = router
            .route("/", get(documents::list))
            .route("/{id}", get(documents::get));
    }

    router.layer(Extension(feature))
}
