//! HTTP handlers for import document endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::{AttachmentBody, RejectBody};
use crate::middleware::CurrentUser;
use crate::services::import::{
    CreateImportInput, ImportFilter, ImportService, ImportSummary, ImportView,
};
use crate::AppState;

fn service(state: AppState) -> ImportService {
    ImportService::new(state.db, state.cache)
}

/// Create a pending import document
pub async fn create_import(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateImportInput>,
) -> AppResult<Json<ImportView>> {
    let view = service(state).create(current_user.0.user_id, input).await?;
    Ok(Json(view))
}

/// Get an import document
pub async fn get_import(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(import_id): Path<Uuid>,
) -> AppResult<Json<ImportView>> {
    let view = service(state).get(import_id).await?;
    Ok(Json(view))
}

/// List import documents
pub async fn list_imports(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ImportFilter>,
) -> AppResult<Json<Vec<ImportSummary>>> {
    let summaries = service(state).list(filter).await?;
    Ok(Json(summaries))
}

/// Approve a pending import, mutating stock
pub async fn approve_import(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(import_id): Path<Uuid>,
) -> AppResult<Json<ImportView>> {
    let view = service(state)
        .approve(import_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(view))
}

/// Reject a pending import with a reason
pub async fn reject_import(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(import_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> AppResult<Json<ImportView>> {
    let view = service(state)
        .reject(import_id, current_user.0.user_id, current_user.0.role, &body.reason)
        .await?;
    Ok(Json(view))
}

/// Cancel a pending import
pub async fn cancel_import(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(import_id): Path<Uuid>,
) -> AppResult<Json<ImportView>> {
    let view = service(state).cancel(import_id).await?;
    Ok(Json(view))
}

/// Register an attachment on a pending import
pub async fn add_import_attachment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(import_id): Path<Uuid>,
    Json(body): Json<AttachmentBody>,
) -> AppResult<Json<ImportView>> {
    let view = service(state).add_attachment(import_id, &body.file_name).await?;
    Ok(Json(view))
}
