//! Return documents: goods coming back from a department to the warehouse
//!
//! Only lines returned in good condition re-enter stock (as a fresh batch at
//! the item's current average cost); other conditions are recorded on the
//! document without any stock mutation, since those goods never rejoin
//! sellable stock after their original export.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    DocumentKind, DocumentStatus, ItemCondition, ReturnReason, TransactionType, UserRole,
    ValidationError,
};
use shared::validation::{validate_document_date, validate_positive_quantity};

use crate::error::{AppError, AppResult};
use crate::services::cache::DocumentCache;
use crate::services::documents::{
    department_exists, ensure_pending, ensure_rejection_reason, item_is_active, normalize_conflict,
    MAX_APPROVAL_ATTEMPTS,
};
use crate::services::stock::{MovementInput, ReceiveInput, StockLedger};

const KIND: DocumentKind = DocumentKind::Return;

/// Return document service
#[derive(Clone)]
pub struct ReturnService {
    db: PgPool,
    ledger: StockLedger,
    cache: DocumentCache,
}

/// Input for creating a return document
#[derive(Debug, Deserialize)]
pub struct CreateReturnInput {
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub reason: ReturnReason,
    pub notes: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub items: Vec<ReturnLineInput>,
}

/// One line of a return document
#[derive(Debug, Deserialize)]
pub struct ReturnLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub condition: ItemCondition,
    pub original_export_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Filters for listing returns
#[derive(Debug, Default, Deserialize)]
pub struct ReturnFilter {
    pub status: Option<DocumentStatus>,
    pub department_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Assembled return view with joined names, cached by document id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub reason: ReturnReason,
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
    pub items: Vec<ReturnLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub condition: ItemCondition,
    pub original_export_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Return list entry (no lines)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReturnSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReturnRow {
    id: Uuid,
    date: NaiveDate,
    department_id: Uuid,
    department_name: String,
    reason: String,
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
struct ReturnLineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    unit: String,
    quantity: Decimal,
    condition: String,
    original_export_id: Option<Uuid>,
    notes: Option<String>,
}

impl ReturnService {
    /// Create a new ReturnService instance
    pub fn new(db: PgPool, cache: DocumentCache) -> Self {
        let ledger = StockLedger::new(db.clone());
        Self { db, ledger, cache }
    }

    /// Validate a return payload, returning every problem at once
    pub async fn validate(&self, input: &CreateReturnInput) -> AppResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        let today = Utc::now().date_naive();

        if validate_document_date(input.date, today).is_err() {
            errors.push(ValidationError::new(
                "date",
                "Return date cannot be in the future",
                "Ngày hoàn trả không hợp lệ",
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
                "A return must contain at least one line",
                "Phiếu hoàn trả phải có ít nhất một mặt hàng",
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

            // A referenced export must exist, contain the item, and cover the
            // returned quantity
            if let Some(export_id) = line.original_export_id {
                let exported = sqlx::query_scalar::<_, Option<Decimal>>(
                    r#"
                    SELECT l.quantity
                    FROM exports e
                    JOIN export_lines l ON l.export_id = e.id AND l.item_id = $2
                    WHERE e.id = $1
                    "#,
                )
                .bind(export_id)
                .bind(line.item_id)
                .fetch_optional(&self.db)
                .await?;

                let export_known = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM exports WHERE id = $1)",
                )
                .bind(export_id)
                .fetch_one(&self.db)
                .await?;

                match (export_known, exported.flatten()) {
                    (false, _) => errors.push(ValidationError::new(
                        format!("{}.original_export_id", field),
                        "Original export does not exist",
                        "Phiếu xuất gốc không tồn tại",
                    )),
                    (true, None) => errors.push(ValidationError::new(
                        format!("{}.original_export_id", field),
                        "Item is not part of the original export",
                        "Sản phẩm không tồn tại trong phiếu xuất gốc",
                    )),
                    (true, Some(exported_quantity)) if line.quantity > exported_quantity => {
                        errors.push(ValidationError::new(
                            format!("{}.quantity", field),
                            format!(
                                "Returned quantity ({}) exceeds exported quantity ({})",
                                line.quantity, exported_quantity
                            ),
                            format!(
                                "Số lượng hoàn trả ({}) vượt quá số lượng xuất ({})",
                                line.quantity, exported_quantity
                            ),
                        ))
                    }
                    _ => {}
                }
            }
        }

        Ok(errors)
    }

    /// Create a pending return; stock is untouched until approval
    pub async fn create(&self, user_id: Uuid, input: CreateReturnInput) -> AppResult<ReturnView> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Err(AppError::ValidationErrors(errors));
        }

        let mut tx = self.db.begin().await?;

        let return_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO returns (date, department_id, reason, processed_by, status, notes, attachments)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.department_id)
        .bind(input.reason.as_str())
        .bind(user_id)
        .bind(&input.notes)
        .bind(input.attachments.as_deref().unwrap_or(&[]))
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                r#"
                INSERT INTO return_lines (return_id, item_id, quantity, condition, original_export_id, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(return_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.condition.as_str())
            .bind(line.original_export_id)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache.invalidate(KIND, return_id).await;

        self.load_view(return_id).await
    }

    /// Approve a pending return: good-condition lines re-enter stock as new
    /// batches, everything inside one atomic transaction
    pub async fn approve(&self, id: Uuid, approver_id: Uuid, role: UserRole) -> AppResult<ReturnView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }

        let mut attempt = 0;
        loop {
            match self.try_approve(id, approver_id).await.map_err(normalize_conflict) {
                Err(AppError::ConcurrencyConflict) if attempt + 1 < MAX_APPROVAL_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!("Return {} approval conflict, retrying (attempt {})", id, attempt);
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
            "SELECT date, status FROM returns WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        ensure_pending(KIND, &status)?;

        let lines = sqlx::query_as::<_, (Uuid, Decimal, String)>(
            "SELECT item_id, quantity, condition FROM return_lines WHERE return_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (item_id, quantity, condition) in lines {
            let condition = ItemCondition::from_str(&condition).ok_or_else(|| {
                AppError::Internal(format!("unknown return condition '{}'", condition))
            })?;

            if !condition.restocks() {
                continue;
            }

            // Returned goods carry the item's current average cost, falling
            // back to its reference cost when no stock remains
            let unit_cost = sqlx::query_scalar::<_, Decimal>(
                r#"
                SELECT COALESCE(NULLIF(sl.average_cost, 0), i.unit_cost)
                FROM items i
                LEFT JOIN stock_levels sl ON sl.item_id = i.id
                WHERE i.id = $1
                "#,
            )
            .bind(item_id)
            .fetch_one(&mut *tx)
            .await?;

            let batch_id = self
                .ledger
                .receive(
                    &mut *tx,
                    ReceiveInput {
                        item_id,
                        quantity,
                        unit_cost,
                        batch_number: None,
                        received_date: date,
                        expiry_date: None,
                        supplier_id: None,
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
                        unit_cost: Some(unit_cost),
                        processed_by: approver_id,
                        notes: Some(format!("Hoàn trả theo phiếu {}", id)),
                    },
                )
                .await?;
        }

        let flipped = sqlx::query(
            r#"
            UPDATE returns
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
                "return document is no longer pending".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reject a pending return; records the reason, touches no stock
    pub async fn reject(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        role: UserRole,
        reason: &str,
    ) -> AppResult<ReturnView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }
        ensure_rejection_reason(reason)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM returns WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE returns
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

    /// Cancel a pending return
    pub async fn cancel(&self, id: Uuid) -> AppResult<ReturnView> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM returns WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE returns SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Register an attachment on a pending return
    pub async fn add_attachment(&self, id: Uuid, file_name: &str) -> AppResult<ReturnView> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM returns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE returns SET attachments = array_append(attachments, $1) WHERE id = $2")
            .bind(file_name)
            .bind(id)
            .execute(&self.db)
            .await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Get a return by id, serving the cached view when present
    pub async fn get(&self, id: Uuid) -> AppResult<ReturnView> {
        if let Some(view) = self.cache.get_view::<ReturnView>(KIND, id).await {
            return Ok(view);
        }

        let view = self.load_view(id).await?;
        self.cache.put_view(KIND, id, &view).await;
        Ok(view)
    }

    /// List returns matching the filters, newest first
    pub async fn list(&self, filter: ReturnFilter) -> AppResult<Vec<ReturnSummary>> {
        let rows = sqlx::query_as::<_, ReturnSummary>(
            r#"
            SELECT r.id, r.date, r.department_id, d.name AS department_name,
                   r.reason, r.status, r.created_at
            FROM returns r
            JOIN departments d ON d.id = r.department_id
            WHERE ($1::text IS NULL OR r.status = $1)
              AND ($2::uuid IS NULL OR r.department_id = $2)
              AND ($3::date IS NULL OR r.date >= $3)
              AND ($4::date IS NULL OR r.date <= $4)
            ORDER BY r.date DESC, r.created_at DESC
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
    async fn load_view(&self, id: Uuid) -> AppResult<ReturnView> {
        let row = sqlx::query_as::<_, ReturnRow>(
            r#"
            SELECT r.id, r.date, r.department_id, d.name AS department_name,
                   r.reason, r.status, r.processed_by, r.notes, r.attachments,
                   r.approved_by, r.approved_at, r.rejected_by, r.rejected_at,
                   r.rejection_reason, r.created_at
            FROM returns r
            JOIN departments d ON d.id = r.department_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        let lines = sqlx::query_as::<_, ReturnLineRow>(
            r#"
            SELECT l.id, l.item_id, i.name AS item_name, i.unit,
                   l.quantity, l.condition, l.original_export_id, l.notes
            FROM return_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.return_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let status = DocumentStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown return status '{}'", row.status)))?;
        let reason = ReturnReason::from_str(&row.reason)
            .ok_or_else(|| AppError::Internal(format!("unknown return reason '{}'", row.reason)))?;

        let mut items = Vec::with_capacity(lines.len());
        for l in lines {
            let condition = ItemCondition::from_str(&l.condition).ok_or_else(|| {
                AppError::Internal(format!("unknown return condition '{}'", l.condition))
            })?;
            items.push(ReturnLineView {
                id: l.id,
                item_id: l.item_id,
                item_name: l.item_name,
                unit: l.unit,
                quantity: l.quantity,
                condition,
                original_export_id: l.original_export_id,
                notes: l.notes,
            });
        }

        Ok(ReturnView {
            id: row.id,
            date: row.date,
            department_id: row.department_id,
            department_name: row.department_name,
            reason,
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
            items,
        })
    }
}
