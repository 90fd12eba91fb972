//! Business logic services for the Restaurant Inventory Platform

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod documents;
pub mod export;
pub mod import;
pub mod reconciliation;
pub mod returns;
pub mod stock;
pub mod waste;

pub use auth::AuthService;
pub use cache::DocumentCache;
pub use catalog::CatalogService;
pub use export::ExportService;
pub use import::ImportService;
pub use reconciliation::ReconciliationService;
pub use returns::ReturnService;
pub use stock::StockLedger;
pub use waste::WasteService;
