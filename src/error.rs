//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    InvalidCredential = 3,
    Forbidden = 4,
    StorageFailure = 5,
    NoSuchBook = 6,
    NoSuchLoan = 7,
    NoSuchUser = 8,
    OutOfStock = 9,
    DuplicateActiveLoan = 10,
    AlreadyReturned = 11,
    StockCeiling = 12,
    BadValue = 13,
}

/// Kind of record a `NotFound` error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Book,
    Loan,
    User,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Resource::Book => "Book",
            Resource::Loan => "Loan",
            Resource::User => "User",
        };
        write!(f, "{}", label)
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} with id {1} not found")]
    NotFound(Resource, i64),

    #[error("Book {0} has no copies available")]
    OutOfStock(i64),

    #[error("User {user_id} already has an active loan of book {book_id}")]
    DuplicateActiveLoan { book_id: i64, user_id: i64 },

    #[error("Loan {0} has already been returned")]
    AlreadyReturned(i64),

    #[error("Book {0} already has all of its copies on the shelf")]
    StockCeiling(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthenticated => ErrorCode::NotAuthenticated,
            AppError::InvalidCredential(_) => ErrorCode::InvalidCredential,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::NotFound(Resource::Book, _) => ErrorCode::NoSuchBook,
            AppError::NotFound(Resource::Loan, _) => ErrorCode::NoSuchLoan,
            AppError::NotFound(Resource::User, _) => ErrorCode::NoSuchUser,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::DuplicateActiveLoan { .. } => ErrorCode::DuplicateActiveLoan,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::StockCeiling(_) => ErrorCode::StockCeiling,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) | AppError::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// HTTP status this error is surfaced with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::OutOfStock(_)
            | AppError::DuplicateActiveLoan { .. }
            | AppError::AlreadyReturned(_)
            | AppError::StockCeiling(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = self.status();

        // Storage details stay in the log
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
