//! Loan ledger queries for the PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{postgres::PgUnitOfWork, LoanLedger};
use crate::{
    error::{AppError, AppResult, Resource},
    models::{
        id::{BookId, LoanId, UserId},
        loan::{Loan, LoanStatus},
    },
};

const LOAN_COLUMNS: &str = "id, book_id, user_id, issued_at, due_at, returned_at, status";

/// Partial unique index allowing one active loan per (book, user)
const ACTIVE_LOAN_INDEX: &str = "loans_one_active_per_book_user";

#[async_trait]
impl LoanLedger for PgUnitOfWork {
    async fn find_by_id(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS))
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn find_active_loan(&mut self, book_id: BookId, user_id: UserId) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE book_id = $1 AND user_id = $2 AND status = $3",
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .bind(user_id)
        .bind(LoanStatus::Active)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn create(&mut self, book_id: BookId, user_id: UserId, due_at: DateTime<Utc>) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (book_id, user_id, issued_at, due_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .bind(user_id)
        .bind(Utc::now())
        .bind(due_at)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .and_then(|db| db.constraint())
                == Some(ACTIVE_LOAN_INDEX);
            if duplicate {
                AppError::DuplicateActiveLoan {
                    book_id: book_id.raw(),
                    user_id: user_id.raw(),
                }
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn mark_returned(&mut self, loan_id: LoanId, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        // Only an active row matches, so a concurrent second return finds nothing
        let returned = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET status = $3, returned_at = $2 WHERE id = $1 AND status = $4 RETURNING {}",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(returned_at)
        .bind(LoanStatus::Returned)
        .bind(LoanStatus::Active)
        .fetch_optional(&mut *self.tx)
        .await?;

        match returned {
            Some(loan) => Ok(loan),
            None => match self.find_by_id(loan_id).await? {
                Some(_) => Err(AppError::AlreadyReturned(loan_id.raw())),
                None => Err(AppError::NotFound(Resource::Loan, loan_id.raw())),
            },
        }
    }

    async fn list_all(&mut self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans ORDER BY issued_at DESC, id DESC",
            LOAN_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }

    async fn list_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 ORDER BY issued_at DESC, id DESC",
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }
}
