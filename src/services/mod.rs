/*
 * Responsibility
 * - Process-level services built at startup and shared through AppState
 */
pub mod database;
pub mod realtime;
