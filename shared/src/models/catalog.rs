//! Catalog reference data: items, categories, suppliers, departments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stock-keeping item (ingredient or supply)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    /// Unit of measure (kg, l, piece, ...)
    pub unit: String,
    /// Reference unit cost used when no batch cost is known
    pub unit_cost: Decimal,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    /// Default shelf life in days, used to derive batch expiry on import
    pub expiry_days: Option<i32>,
    /// Soft-delete flag; items referenced by transactions are never removed
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A goods supplier (counterpart of Import documents)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A restaurant department (counterpart of Export/Return/Waste documents)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
