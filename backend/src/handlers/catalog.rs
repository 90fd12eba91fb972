//! HTTP handlers for catalog management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{Category, Department, Item, Supplier};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::catalog::{
    CatalogService, CreateCategoryInput, CreateDepartmentInput, CreateItemInput,
    CreateSupplierInput, UpdateItemInput,
};
use crate::AppState;

/// Query parameters for listing items
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<Json<Item>> {
    let service = CatalogService::new(state.db);
    let item = service.create_item(input).await?;
    Ok(Json(item))
}

/// Get an item by id
pub async fn get_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let service = CatalogService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Update an item
pub async fn update_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<Item>> {
    let service = CatalogService::new(state.db);
    let item = service.update_item(item_id, input).await?;
    Ok(Json(item))
}

/// Deactivate (soft-delete) an item
pub async fn deactivate_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = CatalogService::new(state.db);
    service.deactivate_item(item_id).await?;
    Ok(Json(()))
}

/// List items
pub async fn list_items(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let service = CatalogService::new(state.db);
    let items = service.list_items(query.include_inactive).await?;
    Ok(Json(items))
}

/// List items below their minimum stock threshold
pub async fn list_low_stock_items(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<(Item, Decimal)>>> {
    let service = CatalogService::new(state.db);
    let items = service.list_low_stock_items().await?;
    Ok(Json(items))
}

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<Json<Category>> {
    let service = CatalogService::new(state.db);
    let category = service.create_category(input).await?;
    Ok(Json(category))
}

/// List categories
pub async fn list_categories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let service = CatalogService::new(state.db);
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}

/// Create a supplier
pub async fn create_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    let service = CatalogService::new(state.db);
    let supplier = service.create_supplier(input).await?;
    Ok(Json(supplier))
}

/// Deactivate a supplier
pub async fn deactivate_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = CatalogService::new(state.db);
    service.deactivate_supplier(supplier_id).await?;
    Ok(Json(()))
}

/// List active suppliers
pub async fn list_suppliers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    let service = CatalogService::new(state.db);
    let suppliers = service.list_suppliers().await?;
    Ok(Json(suppliers))
}

/// Create a department
pub async fn create_department(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateDepartmentInput>,
) -> AppResult<Json<Department>> {
    let service = CatalogService::new(state.db);
    let department = service.create_department(input).await?;
    Ok(Json(department))
}

/// Deactivate a department
pub async fn deactivate_department(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(department_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = CatalogService::new(state.db);
    service.deactivate_department(department_id).await?;
    Ok(Json(()))
}

/// List active departments
pub async fn list_departments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Department>>> {
    let service = CatalogService::new(state.db);
    let departments = service.list_departments().await?;
    Ok(Json(departments))
}
