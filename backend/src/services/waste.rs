//! Waste documents: recorded spoilage, breakage and other losses
//!
//! Approval consumes the wasted quantities from stock through the same FIFO
//! path as exports. A report generator aggregates approved waste over a date
//! range for shrinkage analysis.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    DocumentKind, DocumentStatus, TransactionType, UserRole, ValidationError, WasteType,
};
use shared::validation::{validate_document_date, validate_positive_quantity};

use crate::error::{AppError, AppResult};
use crate::services::cache::DocumentCache;
use crate::services::documents::{
    department_exists, ensure_pending, ensure_rejection_reason, item_is_active, normalize_conflict,
    MAX_APPROVAL_ATTEMPTS,
};
use crate::services::stock::{MovementInput, StockLedger};

const KIND: DocumentKind = DocumentKind::Waste;

/// Waste document service
#[derive(Clone)]
pub struct WasteService {
    db: PgPool,
    ledger: StockLedger,
    cache: DocumentCache,
}

/// Input for creating a waste document
#[derive(Debug, Deserialize)]
pub struct CreateWasteInput {
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub waste_type: WasteType,
    pub description: String,
    pub witnesses: Option<Vec<String>>,
    pub evidence_photos: Option<Vec<String>>,
    pub notes: Option<String>,
    pub items: Vec<WasteLineInput>,
}

/// One line of a waste document
#[derive(Debug, Deserialize)]
pub struct WasteLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub estimated_value: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}

/// Filters for listing waste documents
#[derive(Debug, Default, Deserialize)]
pub struct WasteFilter {
    pub status: Option<DocumentStatus>,
    pub department_id: Option<Uuid>,
    pub waste_type: Option<WasteType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Assembled waste view with joined names, cached by document id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub waste_type: WasteType,
    pub description: String,
    pub witnesses: Vec<String>,
    pub evidence_photos: Vec<String>,
    pub status: DocumentStatus,
    pub processed_by: Uuid,
    pub notes: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<WasteLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub estimated_value: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}

/// Waste list entry (no lines)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WasteSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub waste_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated waste report over a date range
#[derive(Debug, Clone, Serialize)]
pub struct WasteReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<Uuid>,
    pub waste_type: Option<WasteType>,
    pub total_value: Decimal,
    pub items: Vec<WasteReportItem>,
    pub summary: WasteReportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct WasteReportItem {
    pub item_id: Uuid,
    pub item_name: String,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
    pub reasons: Vec<WasteReasonStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WasteReasonStat {
    pub waste_type: String,
    pub quantity: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WasteReportSummary {
    pub by_type: Vec<WasteTypeStat>,
    pub by_department: Vec<WasteDepartmentStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WasteTypeStat {
    pub waste_type: String,
    pub count: i64,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WasteDepartmentStat {
    pub department_id: Uuid,
    pub department_name: String,
    pub count: i64,
    pub total_value: Decimal,
}

#[derive(Debug, FromRow)]
struct WasteRow {
    id: Uuid,
    date: NaiveDate,
    department_id: Uuid,
    department_name: String,
    waste_type: String,
    description: String,
    witnesses: Vec<String>,
    evidence_photos: Vec<String>,
    status: String,
    processed_by: Uuid,
    notes: Option<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct WasteLineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    unit: String,
    quantity: Decimal,
    estimated_value: Decimal,
    reason: String,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct WasteReportRow {
    waste_id: Uuid,
    waste_type: String,
    department_id: Uuid,
    department_name: String,
    item_id: Uuid,
    item_name: String,
    quantity: Decimal,
    estimated_value: Decimal,
}

impl WasteService {
    /// Create a new WasteService instance
    pub fn new(db: PgPool, cache: DocumentCache) -> Self {
        let ledger = StockLedger::new(db.clone());
        Self { db, ledger, cache }
    }

    /// Validate a waste payload, returning every problem at once
    pub async fn validate(&self, input: &CreateWasteInput) -> AppResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        let today = Utc::now().date_naive();

        if validate_document_date(input.date, today).is_err() {
            errors.push(ValidationError::new(
                "date",
                "Waste date cannot be in the future",
                "Ngày báo cáo không hợp lệ",
            ));
        }

        if !department_exists(&self.db, input.department_id).await? {
            errors.push(ValidationError::new(
                "department_id",
                "Department does not exist",
                "Bộ phận không tồn tại",
            ));
        }

        if input.description.trim().is_empty() {
            errors.push(ValidationError::new(
                "description",
                "A detailed description is required",
                "Vui lòng cung cấp mô tả chi tiết",
            ));
        }

        if input.items.is_empty() {
            errors.push(ValidationError::new(
                "items",
                "A waste report must contain at least one line",
                "Báo cáo phải có ít nhất một mặt hàng",
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

            if line.estimated_value <= Decimal::ZERO {
                errors.push(ValidationError::new(
                    format!("{}.estimated_value", field),
                    "Estimated value must be greater than 0",
                    "Giá trị ước tính phải lớn hơn 0",
                ));
            }

            if line.reason.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.reason", field),
                    "A loss reason is required",
                    "Vui lòng cung cấp lý do hao hụt",
                ));
            }
        }

        Ok(errors)
    }

    /// Create a pending waste report; stock is untouched until approval
    pub async fn create(&self, user_id: Uuid, input: CreateWasteInput) -> AppResult<WasteView> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Err(AppError::ValidationErrors(errors));
        }

        let mut tx = self.db.begin().await?;

        let waste_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO wastes (date, department_id, waste_type, description, processed_by,
                                witnesses, evidence_photos, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.department_id)
        .bind(input.waste_type.as_str())
        .bind(&input.description)
        .bind(user_id)
        .bind(input.witnesses.as_deref().unwrap_or(&[]))
        .bind(input.evidence_photos.as_deref().unwrap_or(&[]))
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                r#"
                INSERT INTO waste_lines (waste_id, item_id, quantity, estimated_value, reason, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(waste_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.estimated_value)
            .bind(&line.reason)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache.invalidate(KIND, waste_id).await;

        self.load_view(waste_id).await
    }

    /// Approve a pending waste report: consumes the wasted quantities via
    /// FIFO and logs the OUT movements atomically
    pub async fn approve(&self, id: Uuid, approver_id: Uuid, role: UserRole) -> AppResult<WasteView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }

        let mut attempt = 0;
        loop {
            match self.try_approve(id, approver_id).await.map_err(normalize_conflict) {
                Err(AppError::ConcurrencyConflict) if attempt + 1 < MAX_APPROVAL_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!("Waste {} approval conflict, retrying (attempt {})", id, attempt);
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
            "SELECT status FROM wastes WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste report".to_string()))?;

        ensure_pending(KIND, &status)?;

        let lines = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT item_id, quantity FROM waste_lines WHERE waste_id = $1 ORDER BY id",
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
                            notes: Some(format!("Hao hụt theo báo cáo {}", id)),
                        },
                    )
                    .await?;
            }
        }

        let flipped = sqlx::query(
            r#"
            UPDATE wastes
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
                "waste report is no longer pending".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reject a pending waste report; records the reason, touches no stock
    pub async fn reject(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        role: UserRole,
        reason: &str,
    ) -> AppResult<WasteView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }
        ensure_rejection_reason(reason)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM wastes WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste report".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE wastes
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

    /// Cancel a pending waste report
    pub async fn cancel(&self, id: Uuid) -> AppResult<WasteView> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM wastes WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste report".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE wastes SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Get a waste report by id, serving the cached view when present
    pub async fn get(&self, id: Uuid) -> AppResult<WasteView> {
        if let Some(view) = self.cache.get_view::<WasteView>(KIND, id).await {
            return Ok(view);
        }

        let view = self.load_view(id).await?;
        self.cache.put_view(KIND, id, &view).await;
        Ok(view)
    }

    /// List waste reports matching the filters, newest first
    pub async fn list(&self, filter: WasteFilter) -> AppResult<Vec<WasteSummary>> {
        let rows = sqlx::query_as::<_, WasteSummary>(
            r#"
            SELECT w.id, w.date, w.department_id, d.name AS department_name,
                   w.waste_type, w.status, w.created_at
            FROM wastes w
            JOIN departments d ON d.id = w.department_id
            WHERE ($1::text IS NULL OR w.status = $1)
              AND ($2::uuid IS NULL OR w.department_id = $2)
              AND ($3::text IS NULL OR w.waste_type = $3)
              AND ($4::date IS NULL OR w.date >= $4)
              AND ($5::date IS NULL OR w.date <= $5)
            ORDER BY w.date DESC, w.created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.department_id)
        .bind(filter.waste_type.map(|t| t.as_str().to_string()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Aggregate approved waste over a date range into per-item totals with
    /// per-reason breakdown plus by-type and by-department summaries.
    ///
    /// No matching documents yields an empty report, never an error.
    pub async fn generate_report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        department_id: Option<Uuid>,
        waste_type: Option<WasteType>,
    ) -> AppResult<WasteReport> {
        let rows = sqlx::query_as::<_, WasteReportRow>(
            r#"
            SELECT w.id AS waste_id, w.waste_type, w.department_id, d.name AS department_name,
                   l.item_id, i.name AS item_name, l.quantity, l.estimated_value
            FROM wastes w
            JOIN departments d ON d.id = w.department_id
            JOIN waste_lines l ON l.waste_id = w.id
            JOIN items i ON i.id = l.item_id
            WHERE w.status = 'approved'
              AND w.date >= $1 AND w.date <= $2
              AND ($3::uuid IS NULL OR w.department_id = $3)
              AND ($4::text IS NULL OR w.waste_type = $4)
            ORDER BY w.date, w.id
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .bind(department_id)
        .bind(waste_type.map(|t| t.as_str().to_string()))
        .fetch_all(&self.db)
        .await?;

        struct ItemAcc {
            item_name: String,
            total_quantity: Decimal,
            total_value: Decimal,
            reasons: BTreeMap<String, (Decimal, Decimal)>,
        }

        let mut item_stats: BTreeMap<Uuid, ItemAcc> = BTreeMap::new();
        let mut type_stats: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();
        let mut dept_stats: BTreeMap<Uuid, (String, i64, Decimal)> = BTreeMap::new();
        let mut counted_types: std::collections::HashSet<(Uuid, String)> =
            std::collections::HashSet::new();
        let mut counted_depts: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
        let mut total_value = Decimal::ZERO;

        for row in rows {
            // Document-level counters increment once per document
            if counted_types.insert((row.waste_id, row.waste_type.clone())) {
                type_stats.entry(row.waste_type.clone()).or_insert((0, Decimal::ZERO)).0 += 1;
            }
            if counted_depts.insert(row.waste_id) {
                dept_stats
                    .entry(row.department_id)
                    .or_insert((row.department_name.clone(), 0, Decimal::ZERO))
                    .1 += 1;
            }

            let item = item_stats.entry(row.item_id).or_insert(ItemAcc {
                item_name: row.item_name.clone(),
                total_quantity: Decimal::ZERO,
                total_value: Decimal::ZERO,
                reasons: BTreeMap::new(),
            });
            item.total_quantity += row.quantity;
            item.total_value += row.estimated_value;

            let reason = item
                .reasons
                .entry(row.waste_type.clone())
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            reason.0 += row.quantity;
            reason.1 += row.estimated_value;

            total_value += row.estimated_value;
            type_stats.entry(row.waste_type.clone()).or_insert((0, Decimal::ZERO)).1 +=
                row.estimated_value;
            dept_stats
                .entry(row.department_id)
                .or_insert((row.department_name.clone(), 0, Decimal::ZERO))
                .2 += row.estimated_value;
        }

        Ok(WasteReport {
            start_date,
            end_date,
            department_id,
            waste_type,
            total_value,
            items: item_stats
                .into_iter()
                .map(|(item_id, acc)| WasteReportItem {
                    item_id,
                    item_name: acc.item_name,
                    total_quantity: acc.total_quantity,
                    total_value: acc.total_value,
                    reasons: acc
                        .reasons
                        .into_iter()
                        .map(|(waste_type, (quantity, value))| WasteReasonStat {
                            waste_type,
                            quantity,
                            value,
                        })
                        .collect(),
                })
                .collect(),
            summary: WasteReportSummary {
                by_type: type_stats
                    .into_iter()
                    .map(|(waste_type, (count, value))| WasteTypeStat {
                        waste_type,
                        count,
                        total_value: value,
                    })
                    .collect(),
                by_department: dept_stats
                    .into_iter()
                    .map(|(department_id, (department_name, count, value))| WasteDepartmentStat {
                        department_id,
                        department_name,
                        count,
                        total_value: value,
                    })
                    .collect(),
            },
        })
    }

    /// Assemble the full document view from the authoritative store
    async fn load_view(&self, id: Uuid) -> AppResult<WasteView> {
        let row = sqlx::query_as::<_, WasteRow>(
            r#"
            SELECT w.id, w.date, w.department_id, d.name AS department_name,
                   w.waste_type, w.description, w.witnesses, w.evidence_photos,
                   w.status, w.processed_by, w.notes,
                   w.approved_by, w.approved_at, w.rejected_by, w.rejected_at,
                   w.rejection_reason, w.created_at
            FROM wastes w
            JOIN departments d ON d.id = w.department_id
            WHERE w.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste report".to_string()))?;

        let lines = sqlx::query_as::<_, WasteLineRow>(
            r#"
            SELECT l.id, l.item_id, i.name AS item_name, i.unit,
                   l.quantity, l.estimated_value, l.reason, l.notes
            FROM waste_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.waste_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let status = DocumentStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown waste status '{}'", row.status)))?;
        let waste_type = WasteType::from_str(&row.waste_type)
            .ok_or_else(|| AppError::Internal(format!("unknown waste type '{}'", row.waste_type)))?;

        Ok(WasteView {
            id: row.id,
            date: row.date,
            department_id: row.department_id,
            department_name: row.department_name,
            waste_type,
            description: row.description,
            witnesses: row.witnesses,
            evidence_photos: row.evidence_photos,
            status,
            processed_by: row.processed_by,
            notes: row.notes,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            items: lines
                .into_iter()
                .map(|l| WasteLineView {
                    id: l.id,
                    item_id: l.item_id,
                    item_name: l.item_name,
                    unit: l.unit,
                    quantity: l.quantity,
                    estimated_value: l.estimated_value,
                    reason: l.reason,
                    notes: l.notes,
                })
                .collect(),
        })
    }
}
