//! HTTP handlers for reconciliation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared::models::ShiftType;

use crate::error::AppResult;
use crate::handlers::RejectBody;
use crate::middleware::CurrentUser;
use crate::services::reconciliation::{
    CreateReconciliationInput, ReconciliationFilter, ReconciliationReport, ReconciliationService,
    ReconciliationSummary, ReconciliationView,
};
use crate::AppState;

fn service(state: AppState) -> ReconciliationService {
    ReconciliationService::new(state.db, state.cache)
}

/// Query parameters for the reconciliation report
#[derive(Debug, Deserialize)]
pub struct ReconciliationReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<Uuid>,
    pub shift_type: Option<ShiftType>,
}

/// Create a pending reconciliation
pub async fn create_reconciliation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReconciliationInput>,
) -> AppResult<Json<ReconciliationView>> {
    let view = service(state).create(current_user.0.user_id, input).await?;
    Ok(Json(view))
}

/// Get a reconciliation
pub async fn get_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(reconciliation_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationView>> {
    let view = service(state).get(reconciliation_id).await?;
    Ok(Json(view))
}

/// List reconciliations
pub async fn list_reconciliations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ReconciliationFilter>,
) -> AppResult<Json<Vec<ReconciliationSummary>>> {
    let summaries = service(state).list(filter).await?;
    Ok(Json(summaries))
}

/// Approve a pending reconciliation (status only, no stock effect)
pub async fn approve_reconciliation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(reconciliation_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationView>> {
    let view = service(state)
        .approve(reconciliation_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(view))
}

/// Reject a pending reconciliation with a reason
pub async fn reject_reconciliation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(reconciliation_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> AppResult<Json<ReconciliationView>> {
    let view = service(state)
        .reject(
            reconciliation_id,
            current_user.0.user_id,
            current_user.0.role,
            &body.reason,
        )
        .await?;
    Ok(Json(view))
}

/// Cancel a pending reconciliation, freeing the shift slot
pub async fn cancel_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(reconciliation_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationView>> {
    let view = service(state).cancel(reconciliation_id).await?;
    Ok(Json(view))
}

/// Aggregate approved reconciliations over a date range
pub async fn reconciliation_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ReconciliationReportQuery>,
) -> AppResult<Json<ReconciliationReport>> {
    let report = service(state)
        .generate_report(
            query.start_date,
            query.end_date,
            query.department_id,
            query.shift_type,
        )
        .await?;
    Ok(Json(report))
}
