//! Export documents: goods issued from the warehouse to a department
//!
//! Stock sufficiency is checked twice: against the aggregate at creation so
//! bad requests fail fast, and again atomically at approval when the FIFO
//! consumption actually runs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    DocumentKind, DocumentStatus, ExportPurpose, TransactionType, UserRole, ValidationError,
};
use shared::validation::{validate_document_date, validate_positive_quantity};

use crate::error::{AppError, AppResult};
use crate::services::cache::DocumentCache;
use crate::services::documents::{
    department_exists, ensure_pending, ensure_rejection_reason, item_is_active, normalize_conflict,
    MAX_APPROVAL_ATTEMPTS,
};
use crate::services::stock::{MovementInput, StockLedger};

const KIND: DocumentKind = DocumentKind::Export;

/// Export document service
#[derive(Clone)]
pub struct ExportService {
    db: PgPool,
    ledger: StockLedger,
    cache: DocumentCache,
}

/// Input for creating an export document
#[derive(Debug, Deserialize)]
pub struct CreateExportInput {
    pub date: NaiveDate,
    pub purpose: ExportPurpose,
    pub department_id: Uuid,
    pub notes: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub items: Vec<ExportLineInput>,
}

/// One line of an export document
#[derive(Debug, Deserialize)]
pub struct ExportLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

/// Filters for listing exports
#[derive(Debug, Default, Deserialize)]
pub struct ExportFilter {
    pub status: Option<DocumentStatus>,
    pub department_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Assembled export view with joined names, cached by document id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub purpose: ExportPurpose,
    pub department_id: Uuid,
    pub department_name: String,
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
    pub items: Vec<ExportLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub quantity: Decimal,
    /// Available stock at creation time, kept for audit
    pub stock_snapshot: Decimal,
    pub notes: Option<String>,
}

/// Export list entry (no lines)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExportSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub purpose: String,
    pub department_id: Uuid,
    pub department_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ExportRow {
    id: Uuid,
    date: NaiveDate,
    purpose: String,
    department_id: Uuid,
    department_name: String,
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
struct ExportLineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    unit: String,
    quantity: Decimal,
    stock_snapshot: Decimal,
    notes: Option<String>,
}

impl ExportService {
    /// Create a new ExportService instance
    pub fn new(db: PgPool, cache: DocumentCache) -> Self {
        let ledger = StockLedger::new(db.clone());
        Self { db, ledger, cache }
    }

    /// Validate an export payload, returning every problem at once.
    ///
    /// Includes the fail-fast stock check against available stock; approval
    /// re-checks atomically, so passing here is no guarantee.
    pub async fn validate(&self, input: &CreateExportInput) -> AppResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        let today = Utc::now().date_naive();

        if validate_document_date(input.date, today).is_err() {
            errors.push(ValidationError::new(
                "date",
                "Export date cannot be in the future",
                "Ngày xuất không hợp lệ",
            ));
        }

        if !department_exists(&self.db, input.department_id).await? {
            errors.push(ValidationError::new(
                "department_id",
                "Department does not exist",
                "Bộ phận không tồn tại",
            ));
        }

        if input.items.is_empty() {
            errors.push(ValidationError::new(
                "items",
                "An export must contain at least one line",
                "Phiếu xuất phải có ít nhất một mặt hàng",
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
                continue;
            }

            let available = self.ledger.get_level(line.item_id).await?.available_stock;
            if line.quantity > available {
                errors.push(ValidationError::new(
                    format!("{}.quantity", field),
                    format!(
                        "Requested quantity ({}) exceeds available stock ({})",
                        line.quantity, available
                    ),
                    format!(
                        "Số lượng xuất ({}) vượt quá tồn kho ({})",
                        line.quantity, available
                    ),
                ));
            }
        }

        Ok(errors)
    }

    /// Create a pending export. Each line records the available stock seen at
    /// creation time; stock itself is untouched until approval.
    pub async fn create(&self, user_id: Uuid, input: CreateExportInput) -> AppResult<ExportView> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Err(AppError::ValidationErrors(errors));
        }

        let mut tx = self.db.begin().await?;

        let export_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO exports (date, purpose, department_id, processed_by, status, notes, attachments)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.purpose.as_str())
        .bind(input.department_id)
        .bind(user_id)
        .bind(&input.notes)
        .bind(input.attachments.as_deref().unwrap_or(&[]))
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            let snapshot = sqlx::query_scalar::<_, Option<Decimal>>(
                "SELECT available_stock FROM stock_levels WHERE item_id = $1",
            )
            .bind(line.item_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten()
            .unwrap_or(Decimal::ZERO);

            sqlx::query(
                r#"
                INSERT INTO export_lines (export_id, item_id, quantity, stock_snapshot, notes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(export_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(snapshot)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache.invalidate(KIND, export_id).await;

        self.load_view(export_id).await
    }

    /// Approve a pending export: one atomic transaction re-checks stock,
    /// consumes the oldest batches per line, logs the OUT movements and flips
    /// the status. Serialization conflicts are retried a bounded number of
    /// times; insufficient stock rolls everything back.
    pub async fn approve(&self, id: Uuid, approver_id: Uuid, role: UserRole) -> AppResult<ExportView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }

        let mut attempt = 0;
        loop {
            match self.try_approve(id, approver_id).await.map_err(normalize_conflict) {
                Err(AppError::ConcurrencyConflict) if attempt + 1 < MAX_APPROVAL_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!("Export {} approval conflict, retrying (attempt {})", id, attempt);
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

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM exports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Export".to_string()))?;

        ensure_pending(KIND, &status)?;

        let lines = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT item_id, quantity FROM export_lines WHERE export_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (item_id, quantity) in lines {
            let draws = self.ledger.consume(&mut *tx, item_id, quantity).await?;

            for draw in draws {
                self.ledger
                    .log_movement(
                        &mut *tx,
                        MovementInput {
                            transaction_type: TransactionType::Out,
                            item_id,
                            batch_id: Some(draw.batch_id),
                            quantity: draw.quantity,
                            unit_cost: Some(draw.unit_cost),
                            processed_by: approver_id,
                            notes: Some(format!("Xuất kho theo phiếu {}", id)),
                        },
                    )
                    .await?;
            }
        }

        let flipped = sqlx::query(
            r#"
            UPDATE exports
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
                "export document is no longer pending".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reject a pending export; records the reason, touches no stock
    pub async fn reject(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        role: UserRole,
        reason: &str,
    ) -> AppResult<ExportView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }
        ensure_rejection_reason(reason)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM exports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Export".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE exports
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

    /// Cancel a pending export
    pub async fn cancel(&self, id: Uuid) -> AppResult<ExportView> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM exports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Export".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE exports SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Register an attachment on a pending export
    pub async fn add_attachment(&self, id: Uuid, file_name: &str) -> AppResult<ExportView> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM exports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Export".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE exports SET attachments = array_append(attachments, $1) WHERE id = $2")
            .bind(file_name)
            .bind(id)
            .execute(&self.db)
            .await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Get an export by id, serving the cached view when present
    pub async fn get(&self, id: Uuid) -> AppResult<ExportView> {
        if let Some(view) = self.cache.get_view::<ExportView>(KIND, id).await {
            return Ok(view);
        }

        let view = self.load_view(id).await?;
        self.cache.put_view(KIND, id, &view).await;
        Ok(view)
    }

    /// List exports matching the filters, newest first
    pub async fn list(&self, filter: ExportFilter) -> AppResult<Vec<ExportSummary>> {
        let rows = sqlx::query_as::<_, ExportSummary>(
            r#"
            SELECT e.id, e.date, e.purpose, e.department_id, d.name AS department_name,
                   e.status, e.created_at
            FROM exports e
            JOIN departments d ON d.id = e.department_id
            WHERE ($1::text IS NULL OR e.status = $1)
              AND ($2::uuid IS NULL OR e.department_id = $2)
              AND ($3::date IS NULL OR e.date >= $3)
              AND ($4::date IS NULL OR e.date <= $4)
            ORDER BY e.date DESC, e.created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.department_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Assemble the full document view from the authoritative store
    async fn load_view(&self, id: Uuid) -> AppResult<ExportView> {
        let row = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT e.id, e.date, e.purpose, e.department_id, d.name AS department_name,
                   e.status, e.processed_by, e.notes, e.attachments,
                   e.approved_by, e.approved_at, e.rejected_by, e.rejected_at,
                   e.rejection_reason, e.created_at
            FROM exports e
            JOIN departments d ON d.id = e.department_id
            WHERE e.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Export".to_string()))?;

        let lines = sqlx::query_as::<_, ExportLineRow>(
            r#"
            SELECT l.id, l.item_id, i.name AS item_name, i.unit,
                   l.quantity, l.stock_snapshot, l.notes
            FROM export_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.export_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let status = DocumentStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown export status '{}'", row.status)))?;
        let purpose = ExportPurpose::from_str(&row.purpose)
            .ok_or_else(|| AppError::Internal(format!("unknown export purpose '{}'", row.purpose)))?;

        Ok(ExportView {
            id: row.id,
            date: row.date,
            purpose,
            department_id: row.department_id,
            department_name: row.department_name,
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
                .map(|l| ExportLineView {
                    id: l.id,
                    item_id: l.item_id,
                    item_name: l.item_name,
                    unit: l.unit,
                    quantity: l.quantity,
                    stock_snapshot: l.stock_snapshot,
                    notes: l.notes,
                })
                .collect(),
        })
    }
}
