//! Error handling for the Restaurant Inventory Platform
//!
//! Provides consistent error responses in Vietnamese and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::models::ValidationError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_vi: String,
    },

    /// Business-rule violations, all surfaced at once
    #[error("Document failed validation ({} problem(s))", .0.len())]
    ValidationErrors(Vec<ValidationError>),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// Transaction aborted by the store's serialization check; the approval
    /// orchestrator retries a bounded number of times before surfacing this
    #[error("Concurrent modification conflict, please retry")]
    ConcurrencyConflict,

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_vi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_CREDENTIALS".to_string(),
                    message_en: "Invalid email or password".to_string(),
                    message_vi: "Email hoặc mật khẩu không đúng".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_vi: "Phiên đăng nhập đã hết hạn".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_vi: "Phiên đăng nhập không hợp lệ".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_vi: "Bạn không có quyền thực hiện thao tác này".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_vi,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_vi: message_vi.clone(),
                    field: Some(field.clone()),
                    details: None,
                },
            ),
            AppError::ValidationErrors(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: format!("Document failed validation with {} problem(s)", errors.len()),
                    message_vi: format!("Chứng từ không hợp lệ ({} lỗi)", errors.len()),
                    field: None,
                    details: Some(errors.clone()),
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_vi: format!("Đã tồn tại bản ghi với {} này", field),
                    field: Some(field.clone()),
                    details: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_vi: format!("Không tìm thấy {}", resource),
                    field: None,
                    details: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_vi: format!("Không thể chuyển trạng thái: {}", msg),
                    field: None,
                    details: None,
                },
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: msg.clone(),
                    message_vi: format!("Tồn kho không đủ: {}", msg),
                    field: None,
                    details: None,
                },
            ),
            AppError::ConcurrencyConflict => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONCURRENCY_CONFLICT".to_string(),
                    message_en: "The document was modified concurrently, please retry".to_string(),
                    message_vi: "Dữ liệu bị thay đổi đồng thời, vui lòng thử lại".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_vi: "Lỗi cơ sở dữ liệu".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_vi: "Lỗi máy chủ nội bộ".to_string(),
                    field: None,
                    details: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_vi: "Lỗi máy chủ nội bộ".to_string(),
                    field: None,
                    details: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
