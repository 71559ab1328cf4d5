/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - db: the application database from the startup connection pool
 *   - connections: realtime connection registry watched by the heartbeat task
 * - Cloned per request, so everything inside is Arc/Clone cheap
 */
use mongodb::Database;

use crate::services::realtime::ConnectionManager;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: Database,
    pub connections: ConnectionManager,
}

impl AppState {
    pub fn new(db: Database, connections: ConnectionManager) -> Self {
        Self { db, connections }
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by a lazily connecting client; fine for routes that never query.
    pub(crate) async fn for_tests() -> Self {
        let client = mongodb::Client::with_uri_str(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200",
        )
        .await
        .expect("test connection string must parse");

        Self::new(client.database("immigrant_job_finder"), ConnectionManager::new())
    }
}
