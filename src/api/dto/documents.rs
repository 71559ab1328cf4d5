/*
 * Responsibility
 * - Query/response DTOs shared by the feature document routes
 */
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn validate(&self) -> Result<i64, &'static str> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(n) if n < 1 => Err("limit must be >= 1"),
            Some(n) => Ok(n.min(MAX_LIMIT)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub feature: &'static str,
    pub collection: &'static str,
    pub documents: u64,
}
