/*
 * Responsibility
 * - Router-level middleware (CORS, request id / tracing / limits)
 */
pub mod cors;
pub mod http;
