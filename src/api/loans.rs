//! Loan endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        id::{BookId, LoanId},
        loan::{AdminIssue, Loan, LoanDetails},
    },
};

use super::{
    extractor::{IdPath, ValidJson},
    AuthenticatedUser,
};

/// Loan response with a status message
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    pub loan: Loan,
    pub message: String,
}

/// Borrow one copy of a book for the authenticated user
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 400, description = "Malformed book id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Out of stock or already borrowed by this user")
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    IdPath(book_id): IdPath,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state.services.loans.borrow(BookId(book_id), &caller).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            loan,
            message: "Book borrowed successfully".to_string(),
        }),
    ))
}

/// Return a loan (borrower or administrator)
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 403, description = "Loan belongs to another user"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    IdPath(loan_id): IdPath,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.return_loan(LoanId(loan_id), &caller).await?;

    Ok(Json(LoanResponse {
        loan,
        message: "Book returned successfully".to_string(),
    }))
}

/// Issue a loan on a user's behalf (administrators only)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = AdminIssue,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 400, description = "Missing or malformed field", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Out of stock or user already holds this book")
    )
)]
pub async fn admin_issue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    ValidJson(request): ValidJson<AdminIssue>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state.services.loans.admin_issue(request, &caller).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            loan,
            message: "Loan issued successfully".to_string(),
        }),
    ))
}

/// List every loan with book and user details (administrators only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All loans, newest first", body = Vec<LoanDetails>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_all_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_all_loans(&caller).await?;
    Ok(Json(loans))
}

/// List the authenticated user's loans
#[utoipa::path(
    get,
    path = "/loans/mine",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's loans, newest first", body = Vec<LoanDetails>)
    )
)]
pub async fn list_my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_my_loans(&caller).await?;
    Ok(Json(loans))
}
