//! Import documents: goods received from suppliers
//!
//! An import is created `pending` with no stock effect; approval receives
//! one batch per line and logs the IN movements, all inside one transaction.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    DocumentKind, DocumentStatus, TransactionType, UserRole, ValidationError,
};
use shared::validation::{validate_document_date, validate_expiry_date, validate_positive_quantity};

use crate::error::{AppError, AppResult};
use crate::services::cache::DocumentCache;
use crate::services::documents::{
    ensure_pending, ensure_rejection_reason, item_is_active, normalize_conflict, supplier_exists,
    MAX_APPROVAL_ATTEMPTS,
};
use crate::services::stock::{MovementInput, ReceiveInput, StockLedger};

const KIND: DocumentKind = DocumentKind::Import;

/// Import document service
#[derive(Clone)]
pub struct ImportService {
    db: PgPool,
    ledger: StockLedger,
    cache: DocumentCache,
}

/// Input for creating an import document
#[derive(Debug, Deserialize)]
pub struct CreateImportInput {
    pub date: NaiveDate,
    pub supplier_id: Uuid,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub items: Vec<ImportLineInput>,
}

/// One line of an import document
#[derive(Debug, Deserialize)]
pub struct ImportLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub notes: Option<String>,
}

/// Filters for listing imports
#[derive(Debug, Default, Deserialize)]
pub struct ImportFilter {
    pub status: Option<DocumentStatus>,
    pub supplier_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Assembled import view with joined names, cached by document id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub invoice_number: Option<String>,
    pub total_amount: Decimal,
    pub status: DocumentStatus,
    pub processed_by: Uuid,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ImportLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub notes: Option<String>,
}

/// Import list entry (no lines)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub invoice_number: Option<String>,
    pub total_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ImportRow {
    id: Uuid,
    date: NaiveDate,
    supplier_id: Uuid,
    supplier_name: String,
    invoice_number: Option<String>,
    total_amount: Decimal,
    status: String,
    processed_by: Uuid,
    notes: Option<String>,
    attachments: Vec<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ImportLineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    unit: String,
    quantity: Decimal,
    unit_price: Decimal,
    expiry_date: Option<NaiveDate>,
    batch_number: Option<String>,
    notes: Option<String>,
}

impl ImportService {
    /// Create a new ImportService instance
    pub fn new(db: PgPool, cache: DocumentCache) -> Self {
        let ledger = StockLedger::new(db.clone());
        Self { db, ledger, cache }
    }

    /// Validate an import payload, returning every problem at once
    pub async fn validate(&self, input: &CreateImportInput) -> AppResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        let today = Utc::now().date_naive();

        if validate_document_date(input.date, today).is_err() {
            errors.push(ValidationError::new(
                "date",
                "Import date cannot be in the future",
                "Ngày nhập không hợp lệ",
            ));
        }

        if !supplier_exists(&self.db, input.supplier_id).await? {
            errors.push(ValidationError::new(
                "supplier_id",
                "Supplier does not exist",
                "Nhà cung cấp không tồn tại",
            ));
        }

        if input.items.is_empty() {
            errors.push(ValidationError::new(
                "items",
                "An import must contain at least one line",
                "Phiếu nhập phải có ít nhất một mặt hàng",
            ));
        }

        for line in &input.items {
            let field = format!("items[{}]", line.item_id);

            if !item_is_active(&self.db, line.item_id).await? {
                errors.push(ValidationError::new(
                    field.clone(),
                    format!("Item {} does not exist", line.item_id),
                    format!("Sản phẩm {} không tồn tại", line.item_id),
                ));
                continue;
            }

            if validate_positive_quantity(line.quantity).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.quantity", field),
                    "Quantity must be greater than 0",
                    "Số lượng phải lớn hơn 0",
                ));
            }

            if line.unit_price <= Decimal::ZERO {
                errors.push(ValidationError::new(
                    format!("{}.unit_price", field),
                    "Unit price must be greater than 0",
                    "Đơn giá phải lớn hơn 0",
                ));
            }

            if let Some(expiry) = line.expiry_date {
                if validate_expiry_date(expiry, today).is_err() {
                    errors.push(ValidationError::new(
                        format!("{}.expiry_date", field),
                        "Expiry date must be in the future",
                        "Hạn sử dụng không hợp lệ",
                    ));
                }
            }
        }

        Ok(errors)
    }

    /// Create a pending import. Persists the document and its lines in one
    /// transaction; stock is untouched until approval.
    pub async fn create(&self, user_id: Uuid, input: CreateImportInput) -> AppResult<ImportView> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Err(AppError::ValidationErrors(errors));
        }

        let total_amount: Decimal = input
            .items
            .iter()
            .map(|line| line.quantity * line.unit_price)
            .sum();

        let mut tx = self.db.begin().await?;

        let import_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO imports (date, supplier_id, invoice_number, total_amount,
                                 processed_by, status, notes, attachments)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.supplier_id)
        .bind(&input.invoice_number)
        .bind(total_amount)
        .bind(user_id)
        .bind(&input.notes)
        .bind(input.attachments.as_deref().unwrap_or(&[]))
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                r#"
                INSERT INTO import_lines (import_id, item_id, quantity, unit_price,
                                          expiry_date, batch_number, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(import_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.expiry_date)
            .bind(&line.batch_number)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache.invalidate(KIND, import_id).await;

        self.load_view(import_id).await
    }

    /// Approve a pending import: one atomic transaction receives a batch per
    /// line, logs the IN movements and flips the status. Serialization
    /// conflicts are retried a bounded number of times.
    pub async fn approve(&self, id: Uuid, approver_id: Uuid, role: UserRole) -> AppResult<ImportView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }

        let mut attempt = 0;
        loop {
            match self.try_approve(id, approver_id).await.map_err(normalize_conflict) {
                Err(AppError::ConcurrencyConflict) if attempt + 1 < MAX_APPROVAL_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!("Import {} approval conflict, retrying (attempt {})", id, attempt);
                }
                Err(err) => return Err(err),
                Ok(()) => break,
            }
        }

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    async fn try_approve(&self, id: Uuid, approver_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let (date, status) = sqlx::query_as::<_, (NaiveDate, String)>(
            "SELECT date, status FROM imports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        ensure_pending(KIND, &status)?;

        let lines = sqlx::query_as::<_, (Uuid, Decimal, Decimal, Option<NaiveDate>, Option<String>, Option<i32>)>(
            r#"
            SELECT l.item_id, l.quantity, l.unit_price, l.expiry_date, l.batch_number, i.expiry_days
            FROM import_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.import_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let (supplier_id,) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT supplier_id FROM imports WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        for (item_id, quantity, unit_price, expiry_date, batch_number, default_expiry_days) in lines {
            // Expiry falls back to the item's default shelf life
            let expiry = expiry_date.or_else(|| {
                default_expiry_days
                    .filter(|days| *days > 0)
                    .and_then(|days| date.checked_add_days(Days::new(days as u64)))
            });

            let batch_id = self
                .ledger
                .receive(
                    &mut *tx,
                    ReceiveInput {
                        item_id,
                        quantity,
                        unit_cost: unit_price,
                        batch_number,
                        received_date: date,
                        expiry_date: expiry,
                        supplier_id: Some(supplier_id),
                    },
                )
                .await?;

            self.ledger
                .log_movement(
                    &mut *tx,
                    MovementInput {
                        transaction_type: TransactionType::In,
                        item_id,
                        batch_id: Some(batch_id),
                        quantity,
                        unit_cost: Some(unit_price),
                        processed_by: approver_id,
                        notes: Some(format!("Nhập kho theo phiếu {}", id)),
                    },
                )
                .await?;
        }

        let flipped = sqlx::query(
            r#"
            UPDATE imports
            SET status = 'approved', approved_by = $1, approved_at = NOW()
            WHERE id = $2 AND status = 'pending'
            "#,
        )
        .bind(approver_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() != 1 {
            return Err(AppError::InvalidStateTransition(
                "import document is no longer pending".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reject a pending import; records the reason, touches no stock
    pub async fn reject(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        role: UserRole,
        reason: &str,
    ) -> AppResult<ImportView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }
        ensure_rejection_reason(reason)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM imports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE imports
            SET status = 'rejected', rejected_by = $1, rejected_at = NOW(), rejection_reason = $2
            WHERE id = $3
            "#,
        )
        .bind(rejecter_id)
        .bind(reason)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Cancel a pending import (creator withdrawing the document)
    pub async fn cancel(&self, id: Uuid) -> AppResult<ImportView> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM imports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE imports SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Register an attachment on a pending import
    pub async fn add_attachment(&self, id: Uuid, file_name: &str) -> AppResult<ImportView> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM imports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE imports SET attachments = array_append(attachments, $1) WHERE id = $2")
            .bind(file_name)
            .bind(id)
            .execute(&self.db)
            .await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Get an import by id, serving the cached view when present
    pub async fn get(&self, id: Uuid) -> AppResult<ImportView> {
        if let Some(view) = self.cache.get_view::<ImportView>(KIND, id).await {
            return Ok(view);
        }

        let view = self.load_view(id).await?;
        self.cache.put_view(KIND, id, &view).await;
        Ok(view)
    }

    /// List imports matching the filters, newest first
    pub async fn list(&self, filter: ImportFilter) -> AppResult<Vec<ImportSummary>> {
        let rows = sqlx::query_as::<_, ImportSummary>(
            r#"
            SELECT im.id, im.date, im.supplier_id, s.name AS supplier_name,
                   im.invoice_number, im.total_amount, im.status, im.created_at
            FROM imports im
            JOIN suppliers s ON s.id = im.supplier_id
            WHERE ($1::text IS NULL OR im.status = $1)
              AND ($2::uuid IS NULL OR im.supplier_id = $2)
              AND ($3::date IS NULL OR im.date >= $3)
              AND ($4::date IS NULL OR im.date <= $4)
            ORDER BY im.date DESC, im.created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.supplier_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Assemble the full document view from the authoritative store
    async fn load_view(&self, id: Uuid) -> AppResult<ImportView> {
        let row = sqlx::query_as::<_, ImportRow>(
            r#"
            SELECT im.id, im.date, im.supplier_id, s.name AS supplier_name,
                   im.invoice_number, im.total_amount, im.status, im.processed_by,
                   im.notes, im.attachments, im.approved_by, im.approved_at,
                   im.rejected_by, im.rejected_at, im.rejection_reason, im.created_at
            FROM imports im
            JOIN suppliers s ON s.id = im.supplier_id
            WHERE im.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        let lines = sqlx::query_as::<_, ImportLineRow>(
            r#"
            SELECT l.id, l.item_id, i.name AS item_name, i.unit,
                   l.quantity, l.unit_price, l.expiry_date, l.batch_number, l.notes
            FROM import_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.import_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let status = DocumentStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown import status '{}'", row.status)))?;

        Ok(ImportView {
            id: row.id,
            date: row.date,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            invoice_number: row.invoice_number,
            total_amount: row.total_amount,
            status,
            processed_by: row.processed_by,
            notes: row.notes,
            attachments: row.attachments,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            items: lines
                .into_iter()
                .map(|l| ImportLineView {
                    id: l.id,
                    item_id: l.item_id,
                    item_name: l.item_name,
                    unit: l.unit,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    expiry_date: l.expiry_date,
                    batch_number: l.batch_number,
                    notes: l.notes,
                })
                .collect(),
        })
    }
}
