/*
 * Responsibility
 * - What a repo reports upward
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error: {0}")]
    Db(#[from] mongodb::error::Error),
}
