//! Loan service: borrow, return and administrator protocols
//!
//! Each protocol runs inside a single unit of work. Any error returned before
//! `commit` drops the unit of work, which discards the stock change together
//! with the loan change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult, Resource},
    models::{
        book::BookSummary,
        id::{BookId, LoanId, UserId},
        loan::{AdminIssue, Loan, LoanDetails},
        user::{Identity, UserSummary},
    },
    repository::{CirculationStore, UnitOfWork},
};

/// Loan period applied to self-service borrows
#[derive(Debug, Clone, Copy)]
pub struct LoanPolicy {
    pub period: Duration,
}

impl LoanPolicy {
    pub fn days(days: i64) -> Self {
        Self {
            period: Duration::days(days),
        }
    }
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self::days(config.period_days)
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::from(&LoansConfig::default())
    }
}

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn CirculationStore>,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(store: Arc<dyn CirculationStore>, policy: LoanPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    /// Self-service borrow of one copy by the caller
    pub async fn borrow(&self, book_id: BookId, caller: &Identity) -> AppResult<Loan> {
        let mut uow = self.store.begin().await?;

        uow.get(book_id).await?;
        let due_at = Utc::now() + self.policy.period;
        let loan = open_loan(uow.as_mut(), book_id, caller.user_id, due_at).await?;

        uow.commit().await?;
        tracing::info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            user_id = %loan.user_id,
            due_at = %loan.due_at,
            "Book borrowed"
        );
        Ok(loan)
    }

    /// Return a loan. Allowed for the borrower and for administrators.
    pub async fn return_loan(&self, loan_id: LoanId, caller: &Identity) -> AppResult<Loan> {
        let mut uow = self.store.begin().await?;

        let loan = uow
            .find_by_id(loan_id)
            .await?
            .ok_or(AppError::NotFound(Resource::Loan, loan_id.raw()))?;

        if loan.user_id != caller.user_id && !caller.is_admin() {
            return Err(AppError::Forbidden(format!(
                "Loan {} belongs to another user",
                loan_id
            )));
        }
        if !loan.is_active() {
            return Err(AppError::AlreadyReturned(loan_id.raw()));
        }

        let returned = uow.mark_returned(loan_id, Utc::now()).await?;
        uow.release_copy(returned.book_id).await?;

        uow.commit().await?;
        tracing::info!(
            loan_id = %returned.id,
            book_id = %returned.book_id,
            user_id = %returned.user_id,
            returned_by = %caller.user_id,
            "Loan returned"
        );
        Ok(returned)
    }

    /// Administrator issues a loan on a user's behalf with an explicit due date.
    ///
    /// The one-active-loan-per-book rule applies here exactly as for
    /// self-service borrows.
    pub async fn admin_issue(&self, request: AdminIssue, caller: &Identity) -> AppResult<Loan> {
        caller.require_admin()?;
        if request.due_at <= Utc::now() {
            return Err(AppError::Validation("due_at must be in the future".to_string()));
        }

        let book_id = BookId(request.book_id);
        let user_id = UserId(request.user_id);
        let mut uow = self.store.begin().await?;

        if uow.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(Resource::User, user_id.raw()));
        }
        let loan = open_loan(uow.as_mut(), book_id, user_id, request.due_at).await?;

        uow.commit().await?;
        tracing::info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            user_id = %loan.user_id,
            issued_by = %caller.user_id,
            "Loan issued by administrator"
        );
        Ok(loan)
    }

    /// Every loan with book and user projections (administrators only)
    pub async fn list_all_loans(&self, caller: &Identity) -> AppResult<Vec<LoanDetails>> {
        caller.require_admin()?;

        let mut uow = self.store.begin().await?;
        let loans = uow.list_all().await?;
        let now = Utc::now();

        let mut books: HashMap<BookId, Option<BookSummary>> = HashMap::new();
        let mut users: HashMap<UserId, Option<UserSummary>> = HashMap::new();
        let mut result = Vec::with_capacity(loans.len());
        for loan in loans {
            let book = book_summary(uow.as_mut(), &mut books, loan.book_id).await?;
            let user = match users.get(&loan.user_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = uow.find_user(loan.user_id).await?;
                    users.insert(loan.user_id, found.clone());
                    found
                }
            };
            result.push(LoanDetails {
                is_overdue: loan.is_overdue(now),
                loan,
                book,
                user,
            });
        }

        uow.rollback().await?;
        Ok(result)
    }

    /// The caller's own loans with book projections, newest first
    pub async fn list_my_loans(&self, caller: &Identity) -> AppResult<Vec<LoanDetails>> {
        let mut uow = self.store.begin().await?;
        let loans = uow.list_by_user(caller.user_id).await?;
        let now = Utc::now();

        let mut books = HashMap::new();
        let mut result = Vec::with_capacity(loans.len());
        for loan in loans {
            let book = book_summary(uow.as_mut(), &mut books, loan.book_id).await?;
            result.push(LoanDetails {
                is_overdue: loan.is_overdue(now),
                loan,
                book,
                user: None,
            });
        }

        uow.rollback().await?;
        Ok(result)
    }
}

/// Duplicate check, copy reservation and loan insert, shared by both issuing paths
async fn open_loan(
    uow: &mut dyn UnitOfWork,
    book_id: BookId,
    user_id: UserId,
    due_at: DateTime<Utc>,
) -> AppResult<Loan> {
    if uow.find_active_loan(book_id, user_id).await?.is_some() {
        return Err(AppError::DuplicateActiveLoan {
            book_id: book_id.raw(),
            user_id: user_id.raw(),
        });
    }
    uow.try_reserve_copy(book_id).await?;
    uow.create(book_id, user_id, due_at).await
}

async fn book_summary(
    uow: &mut dyn UnitOfWork,
    cache: &mut HashMap<BookId, Option<BookSummary>>,
    book_id: BookId,
) -> AppResult<Option<BookSummary>> {
    if let Some(cached) = cache.get(&book_id) {
        return Ok(cached.clone());
    }
    let summary = uow.find(book_id).await?.map(|b| b.summary());
    cache.insert(book_id, summary.clone());
    Ok(summary)
}
