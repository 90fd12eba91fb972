//! Route definitions for the Restaurant Inventory Platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        // Protected routes - catalog
        .nest("/items", item_routes())
        .nest("/categories", category_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/departments", department_routes())
        // Protected routes - stock read models and maintenance
        .nest("/inventory", inventory_routes())
        // Protected routes - document workflows
        .nest("/imports", import_routes())
        .nest("/exports", export_routes())
        .nest("/returns", return_routes())
        .nest("/wastes", waste_routes())
        .nest("/reconciliations", reconciliation_routes())
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

/// Item management routes (protected)
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/low-stock", get(handlers::list_low_stock_items))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::deactivate_item),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Category management routes (protected)
fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Supplier management routes (protected)
fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route("/:supplier_id", delete(handlers::deactivate_supplier))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Department management routes (protected)
fn department_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_departments).post(handlers::create_department))
        .route("/:department_id", delete(handlers::deactivate_department))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Stock level, batch and movement routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/levels", get(handlers::list_stock_levels))
        .route("/levels/:item_id", get(handlers::get_stock_level))
        .route("/batches/:item_id", get(handlers::list_item_batches))
        .route("/movements/:item_id", get(handlers::list_item_movements))
        .route("/expire-batches", post(handlers::expire_batches))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Import document routes (protected)
fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_imports).post(handlers::create_import))
        .route("/:import_id", get(handlers::get_import))
        .route("/:import_id/approve", post(handlers::approve_import))
        .route("/:import_id/reject", post(handlers::reject_import))
        .route("/:import_id/cancel", post(handlers::cancel_import))
        .route("/:import_id/attachments", put(handlers::add_import_attachment))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Export document routes (protected)
fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_exports).post(handlers::create_export))
        .route("/:export_id", get(handlers::get_export))
        .route("/:export_id/approve", post(handlers::approve_export))
        .route("/:export_id/reject", post(handlers::reject_export))
        .route("/:export_id/cancel", post(handlers::cancel_export))
        .route("/:export_id/attachments", put(handlers::add_export_attachment))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Return document routes (protected)
fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::create_return))
        .route("/:return_id", get(handlers::get_return))
        .route("/:return_id/approve", post(handlers::approve_return))
        .route("/:return_id/reject", post(handlers::reject_return))
        .route("/:return_id/cancel", post(handlers::cancel_return))
        .route("/:return_id/attachments", put(handlers::add_return_attachment))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Waste document routes (protected)
fn waste_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_wastes).post(handlers::create_waste))
        .route("/report", get(handlers::waste_report))
        .route("/:waste_id", get(handlers::get_waste))
        .route("/:waste_id/approve", post(handlers::approve_waste))
        .route("/:waste_id/reject", post(handlers::reject_waste))
        .route("/:waste_id/cancel", post(handlers::cancel_waste))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Reconciliation routes (protected)
fn reconciliation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_reconciliations).post(handlers::create_reconciliation),
        )
        .route("/report", get(handlers::reconciliation_report))
        .route("/:reconciliation_id", get(handlers::get_reconciliation))
        .route("/:reconciliation_id/approve", post(handlers::approve_reconciliation))
        .route("/:reconciliation_id/reject", post(handlers::reject_reconciliation))
        .route("/:reconciliation_id/cancel", post(handlers::cancel_reconciliation))
        .route_layer(middleware::from_fn(auth_middleware))
}
