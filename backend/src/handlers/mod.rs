//! HTTP handlers for the Restaurant Inventory Platform

pub mod auth;
pub mod catalog;
pub mod exports;
pub mod health;
pub mod imports;
pub mod inventory;
pub mod reconciliation;
pub mod returns;
pub mod waste;

pub use auth::*;
pub use catalog::*;
pub use exports::*;
pub use health::*;
pub use imports::*;
pub use inventory::*;
pub use reconciliation::*;
pub use returns::*;
pub use waste::*;

use serde::Deserialize;

/// Request body for rejecting a document
#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

/// Request body for registering an attachment on a pending document
#[derive(Debug, Deserialize)]
pub struct AttachmentBody {
    pub file_name: String,
}
