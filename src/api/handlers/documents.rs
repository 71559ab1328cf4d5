/*
 * Responsibility
 * - Thin read-only handlers shared by every feature router
 * - The feature (and so its collection) comes from the router's Extension layer
 */
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use mongodb::bson::{Bson, oid::ObjectId};
use serde_json::Value;

use crate::{
    api::{
        Feature,
        dto::documents::{ListQuery, ListResponse, StatusResponse},
    },
    error::AppError,
    repos::document_repo,
    state::AppState,
};

pub async fn status(
    State(state): State<AppState>,
    Extension(feature): Extension<&'static Feature>,
) -> Result<Json<StatusResponse>, AppError> {
    let documents = document_repo::count(&state.db, feature.collection).await?;

    Ok(Json(StatusResponse {
        feature: feature.tag,
        collection: feature.collection,
        documents,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(feature): Extension<&'static Feature>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = query
        .validate()
        .map_err(|msg| AppError::bad_request("INVALID_LIMIT", msg))?;

    let items: Vec<Value> = document_repo::list(&state.db, feature.collection, limit)
        .await?
        .into_iter()
        .map(|doc| Bson::Document(doc).into_relaxed_extjson())
        .collect();

    Ok(Json(ListResponse {
        count: items.len(),
        items,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(feature): Extension<&'static Feature>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = ObjectId::parse_str(&id)
        .map_err(|_| AppError::bad_request("INVALID_ID", "invalid id"))?;

    let doc = document_repo::get(&state.db, feature.collection, id)
        .await?
        .ok_or(AppError::not_found("document"))?;

    Ok(Json(Bson::Document(doc).into_relaxed_extjson()))
}
