//! Error handling for the resale stock server
//!
//! Provides consistent error responses in English and Portuguese

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::QuantityError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_pt: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Stable classification of an [`AppError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InsufficientStock,
    Conflict,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::InvalidInput,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InsufficientStock(_) => ErrorKind::InsufficientStock,
            AppError::DatabaseError(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Field-level validation failure
    pub fn invalid(field: &str, message: impl Into<String>, message_pt: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_pt: message_pt.into(),
        }
    }

    /// Map a quantity check failure on `subject` (e.g. "Allocation 12")
    pub fn from_quantity(subject: &str, err: QuantityError) -> Self {
        match err {
            QuantityError::NonPositive(q) => AppError::invalid(
                "quantity",
                format!("Quantity must be greater than zero, got {}", q),
                format!("A quantidade deve ser maior que zero, recebido {}", q),
            ),
            QuantityError::Insufficient {
                available,
                requested,
            } => AppError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                subject, requested, available
            )),
            QuantityError::Overflow => AppError::invalid(
                "quantity",
                "Quantity is too large",
                "A quantidade é grande demais",
            ),
            QuantityError::AmountOverflow => AppError::invalid(
                "price",
                format!("{}: amount is too large", subject),
                format!("{}: valor grande demais", subject),
            ),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub kind: ErrorKind,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, code, message_en, message_pt, field) = match &self {
            AppError::Validation {
                field,
                message,
                message_pt,
            } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                message_pt.clone(),
                Some(field.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                format!("Já existe um registro com este {}", field),
                Some(field.clone()),
            ),
            AppError::Conflict {
                resource,
                message,
                message_pt,
            } => (
                StatusCode::CONFLICT,
                "CONFLICT",
                message.clone(),
                message_pt.clone(),
                Some(resource.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("{} não encontrado", resource),
                None,
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_STOCK",
                msg.clone(),
                format!("Estoque insuficiente: {}", msg),
                None,
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "Ocorreu um erro no banco de dados".to_string(),
                None,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "Ocorreu um erro interno no servidor".to_string(),
                None,
            ),
        };

        if kind == ErrorKind::Internal {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let detail = ErrorDetail {
            code: code.to_string(),
            kind,
            message_en,
            message_pt,
            field,
        };
        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(AppError::NotFound("Batch".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::invalid("quantity", "bad", "inválido").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            AppError::DuplicateEntry("serial_number".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::Internal("boom".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_quantity_error_mapping() {
        let err = AppError::from_quantity(
            "Allocation 3",
            QuantityError::Insufficient {
                available: 2,
                requested: 5,
            },
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let err = AppError::from_quantity("Allocation 3", QuantityError::NonPositive(0));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = AppError::from_quantity("Sale", QuantityError::AmountOverflow);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_internal_response_hides_details() {
        let response = AppError::Internal("connection reset by peer".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
