//! HTTP handlers for export document endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::{AttachmentBody, RejectBody};
use crate::middleware::CurrentUser;
use crate::services::export::{
    CreateExportInput, ExportFilter, ExportService, ExportSummary, ExportView,
};
use crate::AppState;

fn service(state: AppState) -> ExportService {
    ExportService::new(state.db, state.cache)
}

/// Create a pending export document
pub async fn create_export(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExportInput>,
) -> AppResult<Json<ExportView>> {
    let view = service(state).create(current_user.0.user_id, input).await?;
    Ok(Json(view))
}

/// Get an export document
pub async fn get_export(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(export_id): Path<Uuid>,
) -> AppResult<Json<ExportView>> {
    let view = service(state).get(export_id).await?;
    Ok(Json(view))
}

/// List export documents
pub async fn list_exports(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ExportFilter>,
) -> AppResult<Json<Vec<ExportSummary>>> {
    let summaries = service(state).list(filter).await?;
    Ok(Json(summaries))
}

/// Approve a pending export, consuming stock FIFO
pub async fn approve_export(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(export_id): Path<Uuid>,
) -> AppResult<Json<ExportView>> {
    let view = service(state)
        .approve(export_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(view))
}

/// Reject a pending export with a reason
pub async fn reject_export(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(export_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> AppResult<Json<ExportView>> {
    let view = service(state)
        .reject(export_id, current_user.0.user_id, current_user.0.role, &body.reason)
        .await?;
    Ok(Json(view))
}

/// Cancel a pending export
pub async fn cancel_export(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(export_id): Path<Uuid>,
) -> AppResult<Json<ExportView>> {
    let view = service(state).cancel(export_id).await?;
    Ok(Json(view))
}

/// Register an attachment on a pending export
pub async fn add_export_attachment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(export_id): Path<Uuid>,
    Json(body): Json<AttachmentBody>,
) -> AppResult<Json<ExportView>> {
    let view = service(state).add_attachment(export_id, &body.file_name).await?;
    Ok(Json(view))
}
