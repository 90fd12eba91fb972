//! Stock ledger: batch store, FIFO consumption, stock aggregate, movement log
//!
//! All four document workflows mutate stock exclusively through this service,
//! so the FIFO and conservation invariants are enforced in exactly one place.
//! Mutating primitives take a `&mut PgConnection` and run inside the caller's
//! transaction; the aggregate row is recomputed from the active batches after
//! every receive or consume, never adjusted incrementally.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::models::{
    plan_fifo, weighted_average_cost, BatchDraw, BatchSnapshot, BatchStatus, InventoryBatch,
    StockLevel, StockTransaction, TransactionType,
};

use crate::error::{AppError, AppResult};

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedger {
    db: PgPool,
}

/// Input for receiving a new batch
#[derive(Debug, Clone)]
pub struct ReceiveInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub batch_number: Option<String>,
    pub received_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
}

/// Input for appending one movement to the transaction log
#[derive(Debug, Clone)]
pub struct MovementInput {
    pub transaction_type: TransactionType,
    pub item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub processed_by: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    item_id: Uuid,
    batch_number: Option<String>,
    initial_quantity: Decimal,
    current_quantity: Decimal,
    unit_cost: Decimal,
    received_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    supplier_id: Option<Uuid>,
    status: String,
    created_at: chrono::DateTime<Utc>,
}

impl BatchRow {
    fn into_batch(self) -> InventoryBatch {
        InventoryBatch {
            id: self.id,
            item_id: self.item_id,
            batch_number: self.batch_number,
            initial_quantity: self.initial_quantity,
            current_quantity: self.current_quantity,
            unit_cost: self.unit_cost,
            received_date: self.received_date,
            expiry_date: self.expiry_date,
            supplier_id: self.supplier_id,
            status: BatchStatus::from_str(&self.status).unwrap_or(BatchStatus::Active),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LevelRow {
    item_id: Uuid,
    current_stock: Decimal,
    reserved_stock: Decimal,
    available_stock: Decimal,
    average_cost: Decimal,
    total_value: Decimal,
    next_expiry_date: Option<NaiveDate>,
    last_updated: chrono::DateTime<Utc>,
}

impl LevelRow {
    fn into_level(self) -> StockLevel {
        StockLevel {
            item_id: self.item_id,
            current_stock: self.current_stock,
            reserved_stock: self.reserved_stock,
            available_stock: self.available_stock,
            average_cost: self.average_cost,
            total_value: self.total_value,
            next_expiry_date: self.next_expiry_date,
            last_updated: self.last_updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_type: String,
    item_id: Uuid,
    batch_id: Option<Uuid>,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    processed_by: Uuid,
    notes: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl TransactionRow {
    fn into_transaction(self) -> StockTransaction {
        StockTransaction {
            id: self.id,
            transaction_type: TransactionType::from_str(&self.transaction_type)
                .unwrap_or(TransactionType::Adjustment),
            item_id: self.item_id,
            batch_id: self.batch_id,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            processed_by: self.processed_by,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

impl StockLedger {
    /// Create a new StockLedger instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Transactional primitives (run inside the caller's transaction)
    // ------------------------------------------------------------------

    /// Create a new batch with `current_quantity == initial_quantity` and
    /// bring the item's aggregate up to date.
    pub async fn receive(&self, conn: &mut PgConnection, input: ReceiveInput) -> AppResult<Uuid> {
        if input.quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Received quantity must be greater than 0".to_string(),
                message_vi: "Số lượng nhập phải lớn hơn 0".to_string(),
            });
        }

        let batch_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_batches
                (item_id, batch_number, initial_quantity, current_quantity, unit_cost,
                 received_date, expiry_date, supplier_id, status)
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, 'active')
            RETURNING id
            "#,
        )
        .bind(input.item_id)
        .bind(&input.batch_number)
        .bind(input.quantity)
        .bind(input.unit_cost)
        .bind(input.received_date)
        .bind(input.expiry_date)
        .bind(input.supplier_id)
        .fetch_one(&mut *conn)
        .await?;

        self.refresh_level(conn, input.item_id).await?;

        Ok(batch_id)
    }

    /// Consume `quantity` units of an item from its oldest active batches.
    ///
    /// Batch rows are locked `FOR UPDATE` in received-date order, so two
    /// approvals touching the same item serialize on the same first row
    /// instead of deadlocking. Fails with `InsufficientStock` when the
    /// active batches hold less than requested; the caller's transaction
    /// rollback guarantees no partial decrement is ever visible.
    pub async fn consume(
        &self,
        conn: &mut PgConnection,
        item_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Vec<BatchDraw>> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Consumed quantity must be greater than 0".to_string(),
                message_vi: "Số lượng xuất phải lớn hơn 0".to_string(),
            });
        }

        let rows = sqlx::query_as::<_, (Uuid, Decimal, Decimal)>(
            r#"
            SELECT id, current_quantity, unit_cost
            FROM inventory_batches
            WHERE item_id = $1 AND status = 'active'
            ORDER BY received_date, id
            FOR UPDATE
            "#,
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let snapshots: Vec<BatchSnapshot> = rows
            .into_iter()
            .map(|(id, current_quantity, unit_cost)| BatchSnapshot {
                id,
                current_quantity,
                unit_cost,
            })
            .collect();

        let draws = plan_fifo(&snapshots, quantity).map_err(|shortfall| {
            AppError::InsufficientStock(format!(
                "item {}: requested {} but only {} available",
                item_id, shortfall.requested, shortfall.available
            ))
        })?;

        for draw in &draws {
            sqlx::query(
                r#"
                UPDATE inventory_batches
                SET current_quantity = current_quantity - $1,
                    status = CASE WHEN current_quantity - $1 = 0 THEN 'depleted' ELSE status END
                WHERE id = $2
                "#,
            )
            .bind(draw.quantity)
            .bind(draw.batch_id)
            .execute(&mut *conn)
            .await?;
        }

        self.refresh_level(conn, item_id).await?;

        Ok(draws)
    }

    /// Append one immutable row to the movement log
    pub async fn log_movement(
        &self,
        conn: &mut PgConnection,
        input: MovementInput,
    ) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO stock_transactions
                (transaction_type, item_id, batch_id, quantity, unit_cost, processed_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.transaction_type.as_str())
        .bind(input.item_id)
        .bind(input.batch_id)
        .bind(input.quantity)
        .bind(input.unit_cost)
        .bind(input.processed_by)
        .bind(&input.notes)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Recompute an item's aggregate row from its active batches.
    ///
    /// `current_stock` is always the summed remaining quantity, the average
    /// cost is quantity-weighted, and `available = current − reserved`.
    pub async fn refresh_level(&self, conn: &mut PgConnection, item_id: Uuid) -> AppResult<()> {
        let rows = sqlx::query_as::<_, (Uuid, Decimal, Decimal)>(
            r#"
            SELECT id, current_quantity, unit_cost
            FROM inventory_batches
            WHERE item_id = $1 AND status = 'active'
            "#,
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let snapshots: Vec<BatchSnapshot> = rows
            .into_iter()
            .map(|(id, current_quantity, unit_cost)| BatchSnapshot {
                id,
                current_quantity,
                unit_cost,
            })
            .collect();

        let current: Decimal = snapshots.iter().map(|b| b.current_quantity).sum();
        let average_cost = weighted_average_cost(&snapshots);
        let total_value = current * average_cost;

        let next_expiry = sqlx::query_scalar::<_, Option<NaiveDate>>(
            r#"
            SELECT MIN(expiry_date)
            FROM inventory_batches
            WHERE item_id = $1 AND status = 'active' AND expiry_date IS NOT NULL
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stock_levels
                (item_id, current_stock, reserved_stock, available_stock,
                 average_cost, total_value, next_expiry_date, last_updated)
            VALUES ($1, $2, 0, $2, $3, $4, $5, NOW())
            ON CONFLICT (item_id) DO UPDATE SET
                current_stock = EXCLUDED.current_stock,
                available_stock = EXCLUDED.current_stock - stock_levels.reserved_stock,
                average_cost = EXCLUDED.average_cost,
                total_value = EXCLUDED.total_value,
                next_expiry_date = EXCLUDED.next_expiry_date,
                last_updated = NOW()
            "#,
        )
        .bind(item_id)
        .bind(current)
        .bind(average_cost)
        .bind(total_value)
        .bind(next_expiry)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Get the stock aggregate for an item; items never received yet report
    /// an empty level rather than an error.
    pub async fn get_level(&self, item_id: Uuid) -> AppResult<StockLevel> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(item_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Item".to_string()));
        }

        let row = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT item_id, current_stock, reserved_stock, available_stock,
                   average_cost, total_value, next_expiry_date, last_updated
            FROM stock_levels
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row
            .map(LevelRow::into_level)
            .unwrap_or_else(|| StockLevel::empty(item_id, Utc::now())))
    }

    /// List all stock aggregates
    pub async fn list_levels(&self) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT item_id, current_stock, reserved_stock, available_stock,
                   average_cost, total_value, next_expiry_date, last_updated
            FROM stock_levels
            ORDER BY item_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(LevelRow::into_level).collect())
    }

    /// List an item's batches, oldest first (depleted and expired included
    /// for costing history)
    pub async fn list_batches(&self, item_id: Uuid) -> AppResult<Vec<InventoryBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, item_id, batch_number, initial_quantity, current_quantity, unit_cost,
                   received_date, expiry_date, supplier_id, status, created_at
            FROM inventory_batches
            WHERE item_id = $1
            ORDER BY received_date, id
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(BatchRow::into_batch).collect())
    }

    /// List movements for an item, newest first
    pub async fn list_movements(&self, item_id: Uuid) -> AppResult<Vec<StockTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_type, item_id, batch_id, quantity, unit_cost,
                   processed_by, notes, created_at
            FROM stock_transactions
            WHERE item_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(TransactionRow::into_transaction).collect())
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Flag past-expiry active batches as expired, removing their remainder
    /// from the aggregates and logging one ADJUSTMENT per batch.
    ///
    /// Runs in its own transaction; invoked explicitly (endpoint or
    /// operational task), never as an import-time side effect.
    pub async fn expire_batches(&self, today: NaiveDate, processed_by: Uuid) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal, Decimal)>(
            r#"
            SELECT id, item_id, current_quantity, unit_cost
            FROM inventory_batches
            WHERE status = 'active' AND expiry_date IS NOT NULL AND expiry_date < $1
            ORDER BY received_date, id
            FOR UPDATE
            "#,
        )
        .bind(today)
        .fetch_all(&mut *tx)
        .await?;

        let mut expired = 0u64;
        for (batch_id, item_id, remaining, unit_cost) in rows {
            sqlx::query("UPDATE inventory_batches SET status = 'expired' WHERE id = $1")
                .bind(batch_id)
                .execute(&mut *tx)
                .await?;

            if remaining > Decimal::ZERO {
                self.log_movement(
                    &mut *tx,
                    MovementInput {
                        transaction_type: TransactionType::Adjustment,
                        item_id,
                        batch_id: Some(batch_id),
                        quantity: remaining,
                        unit_cost: Some(unit_cost),
                        processed_by,
                        notes: Some("Hết hạn sử dụng".to_string()),
                    },
                )
                .await?;
            }

            self.refresh_level(&mut *tx, item_id).await?;
            expired += 1;
        }

        tx.commit().await?;

        if expired > 0 {
            tracing::info!("Expired {} batch(es)", expired);
        }

        Ok(expired)
    }
}
