//! MongoDB connection manager.
//!
//! One pooled `mongodb::Client` is opened at startup and shared by every request
//! handler through `AppState`. The handle itself is owned by the shutdown plan,
//! which is the only place allowed to close it.
use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use thiserror::Error;

/// Upper bound for `Client::shutdown` (it waits for outstanding cursors/sessions).
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The database could not be reached at startup.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid connection string: {0}")]
    Options(#[source] mongodb::error::Error),
    #[error("ping failed: {0}")]
    Ping(#[source] mongodb::error::Error),
}

/// An open, verified connection pool.
#[derive(Debug)]
pub struct DatabaseHandle {
    client: Client,
    database: Database,
}

impl DatabaseHandle {
    /// Open a pooled client and verify it with a `ping` against `admin`.
    ///
    /// On ping failure the client is shut down before the error is returned, so a
    /// failed connect never leaves background monitors behind.
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self, DatabaseError> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(DatabaseError::Options)?;
        let client = Client::with_options(options).map_err(DatabaseError::Options)?;

        let ping = client.database("admin").run_command(doc! { "ping": 1 }).await;
        if let Err(e) = ping {
            client.shutdown().await;
            return Err(DatabaseError::Ping(e));
        }

        let database = client.database(database_name);
        Ok(Self { client, database })
    }

    /// Build a handle without contacting the server (the driver connects lazily).
    #[cfg(test)]
    pub(crate) async fn unchecked(uri: &str, database_name: &str) -> Self {
        let client = Client::with_uri_str(uri)
            .await
            .expect("test connection string must parse");
        let database = client.database(database_name);
        Self { client, database }
    }

    /// Application database, cheap to clone into request state.
    pub fn database(&self) -> Database {
        self.database.clone()
    }

    pub fn name(&self) -> &str {
        self.database.name()
    }

    /// Close the pool. Consumes the handle so it can only happen once.
    pub async fn disconnect(self, timeout: Duration) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.client.shutdown()).await
    }
}
