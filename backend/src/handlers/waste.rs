//! HTTP handlers for waste document endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared::models::WasteType;

use crate::error::AppResult;
use crate::handlers::RejectBody;
use crate::middleware::CurrentUser;
use crate::services::waste::{
    CreateWasteInput, WasteFilter, WasteReport, WasteService, WasteSummary, WasteView,
};
use crate::AppState;

fn service(state: AppState) -> WasteService {
    WasteService::new(state.db, state.cache)
}

/// Query parameters for the waste report
#[derive(Debug, Deserialize)]
pub struct WasteReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<Uuid>,
    pub waste_type: Option<WasteType>,
}

/// Create a pending waste report
pub async fn create_waste(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWasteInput>,
) -> AppResult<Json<WasteView>> {
    let view = service(state).create(current_user.0.user_id, input).await?;
    Ok(Json(view))
}

/// Get a waste report
pub async fn get_waste(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(waste_id): Path<Uuid>,
) -> AppResult<Json<WasteView>> {
    let view = service(state).get(waste_id).await?;
    Ok(Json(view))
}

/// List waste reports
pub async fn list_wastes(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<WasteFilter>,
) -> AppResult<Json<Vec<WasteSummary>>> {
    let summaries = service(state).list(filter).await?;
    Ok(Json(summaries))
}

/// Approve a pending waste report, consuming stock FIFO
pub async fn approve_waste(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(waste_id): Path<Uuid>,
) -> AppResult<Json<WasteView>> {
    let view = service(state)
        .approve(waste_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(view))
}

/// Reject a pending waste report with a reason
pub async fn reject_waste(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(waste_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> AppResult<Json<WasteView>> {
    let view = service(state)
        .reject(waste_id, current_user.0.user_id, current_user.0.role, &body.reason)
        .await?;
    Ok(Json(view))
}

/// Cancel a pending waste report
pub async fn cancel_waste(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(waste_id): Path<Uuid>,
) -> AppResult<Json<WasteView>> {
    let view = service(state).cancel(waste_id).await?;
    Ok(Json(view))
}

/// Aggregate approved waste over a date range
pub async fn waste_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<WasteReportQuery>,
) -> AppResult<Json<WasteReport>> {
    let report = service(state)
        .generate_report(
            query.start_date,
            query.end_date,
            query.department_id,
            query.waste_type,
        )
        .await?;
    Ok(Json(report))
}
