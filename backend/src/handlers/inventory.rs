//! HTTP handlers for stock level, batch and movement endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use shared::models::{InventoryBatch, StockLevel, StockTransaction};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::StockLedger;
use crate::AppState;

/// Get the stock aggregate for an item
pub async fn get_stock_level(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<StockLevel>> {
    let ledger = StockLedger::new(state.db);
    let level = ledger.get_level(item_id).await?;
    Ok(Json(level))
}

/// List stock aggregates for all items
pub async fn list_stock_levels(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLevel>>> {
    let ledger = StockLedger::new(state.db);
    let levels = ledger.list_levels().await?;
    Ok(Json(levels))
}

/// List an item's batches, oldest first
pub async fn list_item_batches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryBatch>>> {
    let ledger = StockLedger::new(state.db);
    let batches = ledger.list_batches(item_id).await?;
    Ok(Json(batches))
}

/// List an item's stock movements, newest first
pub async fn list_item_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockTransaction>>> {
    let ledger = StockLedger::new(state.db);
    let movements = ledger.list_movements(item_id).await?;
    Ok(Json(movements))
}

/// Response for the batch expiry sweep
#[derive(Serialize)]
pub struct ExpireBatchesResponse {
    pub expired: u64,
}

/// Flag past-expiry batches as expired, adjusting the aggregates
pub async fn expire_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ExpireBatchesResponse>> {
    let ledger = StockLedger::new(state.db);
    let expired = ledger
        .expire_batches(Utc::now().date_naive(), current_user.0.user_id)
        .await?;
    Ok(Json(ExpireBatchesResponse { expired }))
}
