//! HTTP handlers for return document endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::{AttachmentBody, RejectBody};
use crate::middleware::CurrentUser;
use crate::services::returns::{
    CreateReturnInput, ReturnFilter, ReturnService, ReturnSummary, ReturnView,
};
use crate::AppState;

fn service(state: AppState) -> ReturnService {
    ReturnService::new(state.db, state.cache)
}

/// Create a pending return document
pub async fn create_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReturnInput>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state).create(current_user.0.user_id, input).await?;
    Ok(Json(view))
}

/// Get a return document
pub async fn get_return(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state).get(return_id).await?;
    Ok(Json(view))
}

/// List return documents
pub async fn list_returns(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ReturnFilter>,
) -> AppResult<Json<Vec<ReturnSummary>>> {
    let summaries = service(state).list(filter).await?;
    Ok(Json(summaries))
}

/// Approve a pending return; good-condition lines re-enter stock
pub async fn approve_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state)
        .approve(return_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(view))
}

/// Reject a pending return with a reason
pub async fn reject_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state)
        .reject(return_id, current_user.0.user_id, current_user.0.role, &body.reason)
        .await?;
    Ok(Json(view))
}

/// Cancel a pending return
pub async fn cancel_return(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state).cancel(return_id).await?;
    Ok(Json(view))
}

/// Register an attachment on a pending return
pub async fn add_return_attachment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
    Json(body): Json<AttachmentBody>,
) -> AppResult<Json<ReturnView>> {
    let view = service(state).add_attachment(return_id, &body.file_name).await?;
    Ok(Json(view))
}
