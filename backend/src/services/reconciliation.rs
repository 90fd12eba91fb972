//! Reconciliation documents: expected-vs-counted stock per department shift
//!
//! Reconciliations are read-mostly: validation enforces the arithmetic
//! invariants on every line and approval only flips status, never stock.
//! A report generator aggregates approved reconciliations over a date range.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    DocumentKind, DocumentStatus, ReconciliationLine, ShiftType, UserRole, ValidationError,
};
use shared::validation::{validate_document_date, verify_reconciliation_line};

use crate::error::{AppError, AppResult};
use crate::services::cache::DocumentCache;
use crate::services::documents::{
    department_exists, ensure_pending, ensure_rejection_reason, item_is_active,
};

const KIND: DocumentKind = DocumentKind::Reconciliation;

/// Reconciliation document service
#[derive(Clone)]
pub struct ReconciliationService {
    db: PgPool,
    cache: DocumentCache,
}

/// Input for creating a reconciliation
#[derive(Debug, Deserialize)]
pub struct CreateReconciliationInput {
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub shift_type: ShiftType,
    pub notes: Option<String>,
    pub items: Vec<ReconciliationLine>,
}

/// Filters for listing reconciliations
#[derive(Debug, Default, Deserialize)]
pub struct ReconciliationFilter {
    pub status: Option<DocumentStatus>,
    pub department_id: Option<Uuid>,
    pub shift_type: Option<ShiftType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Assembled reconciliation view, cached by document id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub shift_type: ShiftType,
    pub status: DocumentStatus,
    pub processed_by: Uuid,
    pub notes: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReconciliationLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationLineView {
    pub id: Uuid,
    pub item_name: String,
    #[serde(flatten)]
    pub line: ReconciliationLine,
}

/// Reconciliation list entry (no lines)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReconciliationSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub department_id: Uuid,
    pub department_name: String,
    pub shift_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated discrepancy report over a date range
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<Uuid>,
    pub shift_type: Option<ShiftType>,
    pub total_discrepancy_value: Decimal,
    pub items: Vec<ReconciliationReportItem>,
    pub summary: ReconciliationReportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReportItem {
    pub item_id: Uuid,
    pub item_name: String,
    pub total_discrepancy: Decimal,
    pub total_discrepancy_value: Decimal,
    pub average_discrepancy_rate: Decimal,
    pub shifts: Vec<ReconciliationShiftStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationShiftStat {
    pub date: NaiveDate,
    pub shift_type: String,
    pub discrepancy: Decimal,
    pub discrepancy_rate: Decimal,
    pub discrepancy_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReportSummary {
    pub by_shift: Vec<ReconciliationGroupStat>,
    pub by_department: Vec<ReconciliationDepartmentStat>,
    pub by_date: Vec<ReconciliationDateStat>,
    /// Variance split into surplus (count > system) and shortage
    pub surplus: ReconciliationDirectionStat,
    pub shortage: ReconciliationDirectionStat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationGroupStat {
    pub shift_type: String,
    pub count: i64,
    pub total_discrepancy_value: Decimal,
    pub average_discrepancy_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationDepartmentStat {
    pub department_id: Uuid,
    pub department_name: String,
    pub count: i64,
    pub total_discrepancy_value: Decimal,
    pub average_discrepancy_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationDateStat {
    pub date: NaiveDate,
    pub count: i64,
    pub total_discrepancy_value: Decimal,
    pub average_discrepancy_rate: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationDirectionStat {
    pub line_count: i64,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
}

#[derive(Debug, FromRow)]
struct ReconciliationRow {
    id: Uuid,
    date: NaiveDate,
    department_id: Uuid,
    department_name: String,
    shift_type: String,
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
struct ReconciliationLineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    opening_stock: Decimal,
    received: Decimal,
    withdrawn: Decimal,
    sold: Decimal,
    returned: Decimal,
    wasted: Decimal,
    staff_consumed: Decimal,
    sampled: Decimal,
    system_stock: Decimal,
    actual_stock: Decimal,
    discrepancy: Decimal,
    discrepancy_rate: Decimal,
    discrepancy_value: Decimal,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct ReportRow {
    reconciliation_id: Uuid,
    date: NaiveDate,
    shift_type: String,
    department_id: Uuid,
    department_name: String,
    item_id: Uuid,
    item_name: String,
    discrepancy: Decimal,
    discrepancy_rate: Decimal,
    discrepancy_value: Decimal,
}

impl ReconciliationService {
    /// Create a new ReconciliationService instance
    pub fn new(db: PgPool, cache: DocumentCache) -> Self {
        Self { db, cache }
    }

    /// Validate a reconciliation payload, returning every problem at once.
    ///
    /// Enforces the arithmetic invariants on every line and the one-report-
    /// per-shift rule.
    pub async fn validate(
        &self,
        input: &CreateReconciliationInput,
    ) -> AppResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        let today = Utc::now().date_naive();

        if validate_document_date(input.date, today).is_err() {
            errors.push(ValidationError::new(
                "date",
                "Reconciliation date cannot be in the future",
                "Ngày đối chiếu không hợp lệ",
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
                "A reconciliation must contain at least one line",
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

            if let Err(message) = verify_reconciliation_line(line) {
                errors.push(ValidationError::new(
                    field,
                    message,
                    "Số liệu đối chiếu không khớp",
                ));
            }
        }

        // One live reconciliation per (date, department, shift)
        let duplicate = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reconciliations
                WHERE date = $1 AND department_id = $2 AND shift_type = $3
                  AND status <> 'cancelled'
            )
            "#,
        )
        .bind(input.date)
        .bind(input.department_id)
        .bind(input.shift_type.as_str())
        .fetch_one(&self.db)
        .await?;

        if duplicate {
            errors.push(ValidationError::new(
                "general",
                "A reconciliation already exists for this shift",
                "Đã tồn tại báo cáo đối chiếu cho ca này",
            ));
        }

        Ok(errors)
    }

    /// Create a pending reconciliation; stock is never touched
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateReconciliationInput,
    ) -> AppResult<ReconciliationView> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Err(AppError::ValidationErrors(errors));
        }

        let mut tx = self.db.begin().await?;

        let reconciliation_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO reconciliations (date, department_id, shift_type, processed_by, status, notes)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.department_id)
        .bind(input.shift_type.as_str())
        .bind(user_id)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                r#"
                INSERT INTO reconciliation_lines
                    (reconciliation_id, item_id, opening_stock, received, withdrawn, sold,
                     returned, wasted, staff_consumed, sampled, system_stock, actual_stock,
                     discrepancy, discrepancy_rate, discrepancy_value, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(reconciliation_id)
            .bind(line.item_id)
            .bind(line.opening_stock)
            .bind(line.received)
            .bind(line.withdrawn)
            .bind(line.sold)
            .bind(line.returned)
            .bind(line.wasted)
            .bind(line.staff_consumed)
            .bind(line.sampled)
            .bind(line.system_stock)
            .bind(line.actual_stock)
            .bind(line.discrepancy)
            .bind(line.discrepancy_rate)
            .bind(line.discrepancy_value)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache.invalidate(KIND, reconciliation_id).await;

        self.load_view(reconciliation_id).await
    }

    /// Approve a pending reconciliation; status only, no stock mutation
    pub async fn approve(
        &self,
        id: Uuid,
        approver_id: Uuid,
        role: UserRole,
    ) -> AppResult<ReconciliationView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM reconciliations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE reconciliations
            SET status = 'approved', approved_by = $1, approved_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(approver_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Reject a pending reconciliation; records the reason
    pub async fn reject(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        role: UserRole,
        reason: &str,
    ) -> AppResult<ReconciliationView> {
        if !role.can_approve() {
            return Err(AppError::InsufficientPermissions);
        }
        ensure_rejection_reason(reason)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM reconciliations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query(
            r#"
            UPDATE reconciliations
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

    /// Cancel a pending reconciliation, freeing the shift slot
    pub async fn cancel(&self, id: Uuid) -> AppResult<ReconciliationView> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM reconciliations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation".to_string()))?;

        ensure_pending(KIND, &status)?;

        sqlx::query("UPDATE reconciliations SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.cache.invalidate(KIND, id).await;
        self.load_view(id).await
    }

    /// Get a reconciliation by id, serving the cached view when present
    pub async fn get(&self, id: Uuid) -> AppResult<ReconciliationView> {
        if let Some(view) = self.cache.get_view::<ReconciliationView>(KIND, id).await {
            return Ok(view);
        }

        let view = self.load_view(id).await?;
        self.cache.put_view(KIND, id, &view).await;
        Ok(view)
    }

    /// List reconciliations matching the filters, newest first
    pub async fn list(
        &self,
        filter: ReconciliationFilter,
    ) -> AppResult<Vec<ReconciliationSummary>> {
        let rows = sqlx::query_as::<_, ReconciliationSummary>(
            r#"
            SELECT r.id, r.date, r.department_id, d.name AS department_name,
                   r.shift_type, r.status, r.created_at
            FROM reconciliations r
            JOIN departments d ON d.id = r.department_id
            WHERE ($1::text IS NULL OR r.status = $1)
              AND ($2::uuid IS NULL OR r.department_id = $2)
              AND ($3::text IS NULL OR r.shift_type = $3)
              AND ($4::date IS NULL OR r.date >= $4)
              AND ($5::date IS NULL OR r.date <= $5)
            ORDER BY r.date DESC, r.created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.department_id)
        .bind(filter.shift_type.map(|s| s.as_str().to_string()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Aggregate approved reconciliations over a date range into per-item
    /// discrepancy totals with shift detail, plus summaries by shift type,
    /// department and date, and a surplus/shortage split.
    ///
    /// No matching documents yields an empty report, never an error.
    pub async fn generate_report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        department_id: Option<Uuid>,
        shift_type: Option<ShiftType>,
    ) -> AppResult<ReconciliationReport> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT r.id AS reconciliation_id, r.date, r.shift_type,
                   r.department_id, d.name AS department_name,
                   l.item_id, i.name AS item_name,
                   l.discrepancy, l.discrepancy_rate, l.discrepancy_value
            FROM reconciliations r
            JOIN departments d ON d.id = r.department_id
            JOIN reconciliation_lines l ON l.reconciliation_id = r.id
            JOIN items i ON i.id = l.item_id
            WHERE r.status = 'approved'
              AND r.date >= $1 AND r.date <= $2
              AND ($3::uuid IS NULL OR r.department_id = $3)
              AND ($4::text IS NULL OR r.shift_type = $4)
            ORDER BY r.date, r.id
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .bind(department_id)
        .bind(shift_type.map(|s| s.as_str().to_string()))
        .fetch_all(&self.db)
        .await?;

        struct ItemAcc {
            item_name: String,
            total_discrepancy: Decimal,
            total_value: Decimal,
            shifts: Vec<ReconciliationShiftStat>,
        }

        struct GroupAcc {
            label: String,
            count: i64,
            total_value: Decimal,
            rate_sum: Decimal,
        }

        let mut item_stats: BTreeMap<Uuid, ItemAcc> = BTreeMap::new();
        let mut shift_stats: BTreeMap<String, GroupAcc> = BTreeMap::new();
        let mut dept_stats: BTreeMap<Uuid, GroupAcc> = BTreeMap::new();
        let mut date_stats: BTreeMap<NaiveDate, GroupAcc> = BTreeMap::new();
        let mut counted_shift: std::collections::HashSet<(Uuid, String)> = Default::default();
        let mut counted_dept: std::collections::HashSet<Uuid> = Default::default();
        let mut counted_date: std::collections::HashSet<Uuid> = Default::default();
        let mut surplus = ReconciliationDirectionStat::default();
        let mut shortage = ReconciliationDirectionStat::default();
        let mut total_discrepancy_value = Decimal::ZERO;

        for row in rows {
            if counted_shift.insert((row.reconciliation_id, row.shift_type.clone())) {
                shift_stats
                    .entry(row.shift_type.clone())
                    .or_insert(GroupAcc {
                        label: row.shift_type.clone(),
                        count: 0,
                        total_value: Decimal::ZERO,
                        rate_sum: Decimal::ZERO,
                    })
                    .count += 1;
            }
            if counted_dept.insert(row.reconciliation_id) {
                dept_stats
                    .entry(row.department_id)
                    .or_insert(GroupAcc {
                        label: row.department_name.clone(),
                        count: 0,
                        total_value: Decimal::ZERO,
                        rate_sum: Decimal::ZERO,
                    })
                    .count += 1;
            }
            if counted_date.insert(row.reconciliation_id) {
                date_stats
                    .entry(row.date)
                    .or_insert(GroupAcc {
                        label: row.date.to_string(),
                        count: 0,
                        total_value: Decimal::ZERO,
                        rate_sum: Decimal::ZERO,
                    })
                    .count += 1;
            }

            let item = item_stats.entry(row.item_id).or_insert(ItemAcc {
                item_name: row.item_name.clone(),
                total_discrepancy: Decimal::ZERO,
                total_value: Decimal::ZERO,
                shifts: Vec::new(),
            });
            item.total_discrepancy += row.discrepancy;
            item.total_value += row.discrepancy_value;
            item.shifts.push(ReconciliationShiftStat {
                date: row.date,
                shift_type: row.shift_type.clone(),
                discrepancy: row.discrepancy,
                discrepancy_rate: row.discrepancy_rate,
                discrepancy_value: row.discrepancy_value,
            });

            total_discrepancy_value += row.discrepancy_value;

            if let Some(stats) = shift_stats.get_mut(&row.shift_type) {
                stats.total_value += row.discrepancy_value;
                stats.rate_sum += row.discrepancy_rate;
            }
            if let Some(stats) = dept_stats.get_mut(&row.department_id) {
                stats.total_value += row.discrepancy_value;
                stats.rate_sum += row.discrepancy_rate;
            }
            if let Some(stats) = date_stats.get_mut(&row.date) {
                stats.total_value += row.discrepancy_value;
                stats.rate_sum += row.discrepancy_rate;
            }

            let direction = if row.discrepancy >= Decimal::ZERO {
                &mut surplus
            } else {
                &mut shortage
            };
            direction.line_count += 1;
            direction.total_quantity += row.discrepancy.abs();
            direction.total_value += row.discrepancy_value.abs();
        }

        let finish = |acc: GroupAcc| {
            let average = if acc.count > 0 {
                acc.rate_sum / Decimal::from(acc.count)
            } else {
                Decimal::ZERO
            };
            (acc.label, acc.count, acc.total_value, average)
        };

        Ok(ReconciliationReport {
            start_date,
            end_date,
            department_id,
            shift_type,
            total_discrepancy_value,
            items: item_stats
                .into_iter()
                .map(|(item_id, acc)| {
                    let shift_count = acc.shifts.len();
                    let average_discrepancy_rate = if shift_count > 0 {
                        acc.shifts
                            .iter()
                            .map(|s| s.discrepancy_rate)
                            .sum::<Decimal>()
                            / Decimal::from(shift_count as i64)
                    } else {
                        Decimal::ZERO
                    };
                    ReconciliationReportItem {
                        item_id,
                        item_name: acc.item_name,
                        total_discrepancy: acc.total_discrepancy,
                        total_discrepancy_value: acc.total_value,
                        average_discrepancy_rate,
                        shifts: acc.shifts,
                    }
                })
                .collect(),
            summary: ReconciliationReportSummary {
                by_shift: shift_stats
                    .into_values()
                    .map(|acc| {
                        let (label, count, total_value, average) = finish(acc);
                        ReconciliationGroupStat {
                            shift_type: label,
                            count,
                            total_discrepancy_value: total_value,
                            average_discrepancy_rate: average,
                        }
                    })
                    .collect(),
                by_department: dept_stats
                    .into_iter()
                    .map(|(dept_id, acc)| {
                        let (label, count, total_value, average) = finish(acc);
                        ReconciliationDepartmentStat {
                            department_id: dept_id,
                            department_name: label,
                            count,
                            total_discrepancy_value: total_value,
                            average_discrepancy_rate: average,
                        }
                    })
                    .collect(),
                by_date: date_stats
                    .into_iter()
                    .map(|(date, acc)| {
                        let (_, count, total_value, average) = finish(acc);
                        ReconciliationDateStat {
                            date,
                            count,
                            total_discrepancy_value: total_value,
                            average_discrepancy_rate: average,
                        }
                    })
                    .collect(),
                surplus,
                shortage,
            },
        })
    }

    /// Assemble the full document view from the authoritative store
    async fn load_view(&self, id: Uuid) -> AppResult<ReconciliationView> {
        let row = sqlx::query_as::<_, ReconciliationRow>(
            r#"
            SELECT r.id, r.date, r.department_id, d.name AS department_name,
                   r.shift_type, r.status, r.processed_by, r.notes,
                   r.approved_by, r.approved_at, r.rejected_by, r.rejected_at,
                   r.rejection_reason, r.created_at
            FROM reconciliations r
            JOIN departments d ON d.id = r.department_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation".to_string()))?;

        let lines = sqlx::query_as::<_, ReconciliationLineRow>(
            r#"
            SELECT l.id, l.item_id, i.name AS item_name,
                   l.opening_stock, l.received, l.withdrawn, l.sold, l.returned,
                   l.wasted, l.staff_consumed, l.sampled, l.system_stock, l.actual_stock,
                   l.discrepancy, l.discrepancy_rate, l.discrepancy_value, l.notes
            FROM reconciliation_lines l
            JOIN items i ON i.id = l.item_id
            WHERE l.reconciliation_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let status = DocumentStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!("unknown reconciliation status '{}'", row.status))
        })?;
        let shift_type = ShiftType::from_str(&row.shift_type).ok_or_else(|| {
            AppError::Internal(format!("unknown shift type '{}'", row.shift_type))
        })?;

        Ok(ReconciliationView {
            id: row.id,
            date: row.date,
            department_id: row.department_id,
            department_name: row.department_name,
            shift_type,
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
                .map(|l| ReconciliationLineView {
                    id: l.id,
                    item_name: l.item_name,
                    line: ReconciliationLine {
                        item_id: l.item_id,
                        opening_stock: l.opening_stock,
                        received: l.received,
                        withdrawn: l.withdrawn,
                        sold: l.sold,
                        returned: l.returned,
                        wasted: l.wasted,
                        staff_consumed: l.staff_consumed,
                        sampled: l.sampled,
                        system_stock: l.system_stock,
                        actual_stock: l.actual_stock,
                        discrepancy: l.discrepancy,
                        discrepancy_rate: l.discrepancy_rate,
                        discrepancy_value: l.discrepancy_value,
                        notes: l.notes,
                    },
                })
                .collect(),
        })
    }
}
