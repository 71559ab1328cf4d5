/*
 * Responsibility
 * - Read-only access to a feature collection on the shared Database
 * - Documents are returned as-is; each feature owns its own schema
 */
use futures_util::TryStreamExt;
use mongodb::{
    Database,
    bson::{Document, doc, oid::ObjectId},
};

use crate::repos::error::RepoError;

pub async fn list(db: &Database, collection: &str, limit: i64) -> Result<Vec<Document>, RepoError> {
    let docs = db
        .collection::<Document>(collection)
        .find(doc! {})
        .sort(doc! { "_id": -1 })
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    Ok(docs)
}

pub async fn get(db: &Database, collection: &str, id: ObjectId) -> Result<Option<Document>, RepoError> {
    let doc = db
        .collection::<Document>(collection)
        .find_one(doc! { "_id": id })
        .await?;

    Ok(doc)
}

pub async fn count(db: &Database, collection: &str) -> Result<u64, RepoError> {
    let n = db
        .collection::<Document>(collection)
        .estimated_document_count()
        .await?;

    Ok(n)
}
