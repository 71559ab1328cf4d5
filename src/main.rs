/*
 * Responsibility
 * - tokio runtime
 * - call app::run() (no logic here); an Err exits with a non-zero status
 */
mod api;
mod app;
mod config;
mod error;
mod lifecycle;
mod middleware;
mod repos;
mod services;
mod state;

use crate::error::ServerError;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    app::run().await
}
