//! Repository layer: catalog stock, loan ledger and the unit of work tying them together
//!
//! Every mutation runs inside a [`UnitOfWork`] obtained from a
//! [`CirculationStore`]. Writes made through a unit of work become visible only
//! on [`UnitOfWork::commit`]; dropping it without committing discards them.

pub mod books;
pub mod loans;
pub mod memory;
pub mod postgres;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult, Resource},
    models::{
        book::Book,
        id::{BookId, LoanId, UserId},
        loan::Loan,
        user::UserSummary,
    },
};

pub use memory::{Fault, MemoryStore};
pub use postgres::PgStore;

/// Copy-count ledger with atomic reserve/release primitives
#[async_trait]
pub trait BookCatalog: Send {
    async fn find(&mut self, book_id: BookId) -> AppResult<Option<Book>>;

    async fn get(&mut self, book_id: BookId) -> AppResult<Book> {
        self.find(book_id)
            .await?
            .ok_or(AppError::NotFound(Resource::Book, book_id.raw()))
    }

    async fn list(&mut self) -> AppResult<Vec<Book>>;

    /// Take one copy off the shelf. Never decrements a stock of zero.
    async fn try_reserve_copy(&mut self, book_id: BookId) -> AppResult<Book>;

    /// Put one copy back. Never raises stock above `total_copies`.
    async fn release_copy(&mut self, book_id: BookId) -> AppResult<Book>;
}

/// Loan record storage
#[async_trait]
pub trait LoanLedger: Send {
    async fn find_by_id(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>>;

    async fn find_active_loan(&mut self, book_id: BookId, user_id: UserId) -> AppResult<Option<Loan>>;

    /// Insert an active loan issued now
    async fn create(&mut self, book_id: BookId, user_id: UserId, due_at: DateTime<Utc>) -> AppResult<Loan>;

    /// Flip an active loan to returned. A loan can be flipped exactly once.
    async fn mark_returned(&mut self, loan_id: LoanId, returned_at: DateTime<Utc>) -> AppResult<Loan>;

    /// All loans, most recently issued first
    async fn list_all(&mut self) -> AppResult<Vec<Loan>>;

    /// A user's loans, most recently issued first
    async fn list_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>>;
}

/// Read-only view of the users owned by the identity collaborator
#[async_trait]
pub trait UserDirectory: Send {
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserSummary>>;
}

/// One atomic unit of work over the catalog and the ledger
#[async_trait]
pub trait UnitOfWork: BookCatalog + LoanLedger + UserDirectory {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Storage handle owned by the process entry point
#[async_trait]
pub trait CirculationStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Release pooled resources on shutdown
    async fn close(&self) {}
}
