//! Shared plumbing for the document approval workflows
//!
//! All five document kinds run the same state machine and the same atomic
//! approval shape: one transaction covering re-validation, stock mutation,
//! log append and the guarded status flip. This module holds the pieces the
//! workflows share: pending-state guards, serialization-conflict detection,
//! the bounded retry policy, and counterpart existence checks used during
//! validation.

use shared::models::{DocumentKind, DocumentStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Approvals retry this many times on serialization conflicts before
/// surfacing `ConcurrencyConflict` to the caller.
pub const MAX_APPROVAL_ATTEMPTS: u32 = 3;

/// Whether a database error is a serialization failure or deadlock the
/// caller should retry (SQLSTATE 40001 / 40P01).
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// Collapse retryable database errors into `ConcurrencyConflict`
pub fn normalize_conflict(err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(db_err) if is_serialization_failure(&db_err) => {
            AppError::ConcurrencyConflict
        }
        other => other,
    }
}

/// Parse a stored status string, defaulting unknown values to an error
pub fn parse_status(kind: DocumentKind, raw: &str) -> AppResult<DocumentStatus> {
    DocumentStatus::from_str(raw).ok_or_else(|| {
        AppError::Internal(format!("{} document carries unknown status '{}'", kind.as_str(), raw))
    })
}

/// Guard that a document is still pending before approve/reject/cancel
pub fn ensure_pending(kind: DocumentKind, raw_status: &str) -> AppResult<()> {
    let status = parse_status(kind, raw_status)?;
    if status != DocumentStatus::Pending {
        return Err(AppError::InvalidStateTransition(format!(
            "{} document is {}, not pending",
            kind.as_str(),
            status.as_str()
        )));
    }
    Ok(())
}

/// Non-empty rejection reason is required before a document can be rejected
pub fn ensure_rejection_reason(reason: &str) -> AppResult<()> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation {
            field: "reason".to_string(),
            message: "A rejection reason is required".to_string(),
            message_vi: "Vui lòng cung cấp lý do từ chối".to_string(),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Counterpart existence checks used by document validation
// ----------------------------------------------------------------------

pub async fn supplier_exists(db: &PgPool, supplier_id: Uuid) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1 AND is_active)",
    )
    .bind(supplier_id)
    .fetch_one(db)
    .await?;
    Ok(exists)
}

pub async fn department_exists(db: &PgPool, department_id: Uuid) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE id = $1 AND is_active)",
    )
    .bind(department_id)
    .fetch_one(db)
    .await?;
    Ok(exists)
}

pub async fn item_is_active(db: &PgPool, item_id: Uuid) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND is_active)",
    )
    .bind(item_id)
    .fetch_one(db)
    .await?;
    Ok(exists)
}
