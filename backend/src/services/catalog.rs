//! Catalog management: items, categories, suppliers and departments
//!
//! Reference data consumed by every document workflow. Items are only ever
//! soft-deleted: once a stock transaction references an item, the row must
//! survive for the audit trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{Category, Department, Item, Supplier};

use crate::error::{AppError, AppResult};

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Input for creating an item
#[derive(Debug, Deserialize)]
pub struct CreateItemInput {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub unit: String,
    pub unit_cost: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    pub expiry_days: Option<i32>,
}

/// Input for updating an item
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    pub expiry_days: Option<i32>,
}

/// Input for creating a supplier
#[derive(Debug, Deserialize)]
pub struct CreateSupplierInput {
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Input for creating a department
#[derive(Debug, Deserialize)]
pub struct CreateDepartmentInput {
    pub name: String,
    pub description: Option<String>,
}

/// Input for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    category_id: Option<Uuid>,
    unit: String,
    unit_cost: Decimal,
    min_stock: Option<Decimal>,
    max_stock: Option<Decimal>,
    expiry_days: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> Item {
        Item {
            id: self.id,
            name: self.name,
            category_id: self.category_id,
            unit: self.unit,
            unit_cost: self.unit_cost,
            min_stock: self.min_stock,
            max_stock: self.max_stock,
            expiry_days: self.expiry_days,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ITEM_COLUMNS: &str = "id, name, category_id, unit, unit_cost, min_stock, max_stock, \
                            expiry_days, is_active, created_at, updated_at";

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Create an item
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Item name is required".to_string(),
                message_vi: "Tên sản phẩm là bắt buộc".to_string(),
            });
        }
        if input.unit.trim().is_empty() {
            return Err(AppError::Validation {
                field: "unit".to_string(),
                message: "Unit of measure is required".to_string(),
                message_vi: "Đơn vị tính là bắt buộc".to_string(),
            });
        }

        if let Some(category_id) = input.category_id {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                    .bind(category_id)
                    .fetch_one(&self.db)
                    .await?;
            if !exists {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (name, category_id, unit, unit_cost, min_stock, max_stock, expiry_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(input.category_id)
        .bind(input.unit.trim())
        .bind(input.unit_cost.unwrap_or(Decimal::ZERO))
        .bind(input.min_stock)
        .bind(input.max_stock)
        .bind(input.expiry_days)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into_item())
    }

    /// Update an item's mutable fields
    pub async fn update_item(&self, id: Uuid, input: UpdateItemInput) -> AppResult<Item> {
        let existing = self.get_item(id).await?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET name = $1, category_id = $2, unit = $3, unit_cost = $4,
                min_stock = $5, max_stock = $6, expiry_days = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(input.name.unwrap_or(existing.name))
        .bind(input.category_id.or(existing.category_id))
        .bind(input.unit.unwrap_or(existing.unit))
        .bind(input.unit_cost.unwrap_or(existing.unit_cost))
        .bind(input.min_stock.or(existing.min_stock))
        .bind(input.max_stock.or(existing.max_stock))
        .bind(input.expiry_days.or(existing.expiry_days))
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into_item())
    }

    /// Soft-delete an item. Rows referenced by the transaction log are never
    /// removed, only deactivated.
    pub async fn deactivate_item(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE items SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Item".to_string()));
        }
        Ok(())
    }

    /// Get an item by id
    pub async fn get_item(&self, id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into_item())
    }

    /// List items, optionally including deactivated ones
    pub async fn list_items(&self, include_inactive: bool) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE ($1 OR is_active)
            ORDER BY name
            "#
        ))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    /// Items whose current stock sits below their minimum threshold
    pub async fn list_low_stock_items(&self) -> AppResult<Vec<(Item, Decimal)>> {
        let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT i.id, COALESCE(sl.current_stock, 0)
            FROM items i
            LEFT JOIN stock_levels sl ON sl.item_id = i.id
            WHERE i.is_active AND i.min_stock IS NOT NULL
              AND COALESCE(sl.current_stock, 0) < i.min_stock
            ORDER BY i.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for (item_id, current_stock) in rows {
            result.push((self.get_item(item_id).await?, current_stock));
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    /// Create a category
    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, DateTime<Utc>)>(
            r#"
            INSERT INTO categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateEntry("category name".to_string())
            }
            _ => AppError::DatabaseError(err),
        })?;

        Ok(Category {
            id: row.0,
            name: row.1,
            description: row.2,
            created_at: row.3,
        })
    }

    /// List categories
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, DateTime<Utc>)>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Category {
                id: r.0,
                name: r.1,
                description: r.2,
                created_at: r.3,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Suppliers
    // ------------------------------------------------------------------

    /// Create a supplier
    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Supplier name is required".to_string(),
                message_vi: "Tên nhà cung cấp là bắt buộc".to_string(),
            });
        }

        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>, Option<String>, bool, DateTime<Utc>)>(
            r#"
            INSERT INTO suppliers (name, contact_name, phone, address)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, contact_name, phone, address, is_active, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;

        Ok(Supplier {
            id: row.0,
            name: row.1,
            contact_name: row.2,
            phone: row.3,
            address: row.4,
            is_active: row.5,
            created_at: row.6,
        })
    }

    /// Soft-delete a supplier
    pub async fn deactivate_supplier(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE suppliers SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Supplier".to_string()));
        }
        Ok(())
    }

    /// List active suppliers
    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>, Option<String>, bool, DateTime<Utc>)>(
            r#"
            SELECT id, name, contact_name, phone, address, is_active, created_at
            FROM suppliers
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Supplier {
                id: r.0,
                name: r.1,
                contact_name: r.2,
                phone: r.3,
                address: r.4,
                is_active: r.5,
                created_at: r.6,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Departments
    // ------------------------------------------------------------------

    /// Create a department
    pub async fn create_department(&self, input: CreateDepartmentInput) -> AppResult<Department> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Department name is required".to_string(),
                message_vi: "Tên bộ phận là bắt buộc".to_string(),
            });
        }

        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, bool, DateTime<Utc>)>(
            r#"
            INSERT INTO departments (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, is_active, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateEntry("department name".to_string())
            }
            _ => AppError::DatabaseError(err),
        })?;

        Ok(Department {
            id: row.0,
            name: row.1,
            description: row.2,
            is_active: row.3,
            created_at: row.4,
        })
    }

    /// Soft-delete a department
    pub async fn deactivate_department(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE departments SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Department".to_string()));
        }
        Ok(())
    }

    /// List active departments
    pub async fn list_departments(&self) -> AppResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, bool, DateTime<Utc>)>(
            r#"
            SELECT id, name, description, is_active, created_at
            FROM departments
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Department {
                id: r.0,
                name: r.1,
                description: r.2,
                is_active: r.3,
                created_at: r.4,
            })
            .collect())
    }
}
