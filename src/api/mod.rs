/*
 * Responsibility
 * - Public surface of the HTTP API (routes() and the feature table)
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::{FEATURES, Feature, routes};
