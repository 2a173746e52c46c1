//! In-memory store
//!
//! A unit of work holds the store's single lock from `begin` until it is
//! committed or dropped, so units of work never interleave. Writes go to a
//! working copy that replaces the shared state on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookCatalog, CirculationStore, LoanLedger, UnitOfWork, UserDirectory};
use crate::{
    config::StorageConfig,
    error::{AppError, AppResult, Resource},
    models::{
        book::Book,
        id::{BookId, LoanId, UserId},
        loan::{Loan, LoanStatus},
        user::{Role, UserSummary},
    },
};

/// Storage failure that can be injected to exercise rollback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next loan insert fails
    CreateLoan,
    /// Next copy release fails
    ReleaseCopy,
    /// Next commit fails
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<BookId, Book>,
    loans: BTreeMap<LoanId, Loan>,
    users: BTreeMap<UserId, UserSummary>,
    last_book_id: i64,
    last_loan_id: i64,
    last_user_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the users and books listed in the storage config
    pub async fn seeded(config: &StorageConfig) -> AppResult<Self> {
        let store = Self::new();
        for user in &config.users {
            store.add_user(&user.username, user.role).await;
        }
        for book in &config.books {
            store
                .add_book(&book.title, &book.author, book.isbn.as_deref(), book.copies)
                .await?;
        }
        Ok(store)
    }

    /// Shelve a new title with `copies` copies, all available
    pub async fn add_book(&self, title: &str, author: &str, isbn: Option<&str>, copies: i32) -> AppResult<Book> {
        if copies < 0 {
            return Err(AppError::Validation(format!("copies must not be negative, got {}", copies)));
        }

        let mut state = self.state.lock().await;
        if let Some(isbn) = isbn {
            if state.books.values().any(|b| b.isbn.as_deref() == Some(isbn)) {
                return Err(AppError::Validation(format!("ISBN {} is already catalogued", isbn)));
            }
        }

        state.last_book_id += 1;
        let book = Book {
            id: BookId(state.last_book_id),
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.map(str::to_string),
            stock: copies,
            total_copies: copies,
        };
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    /// Register a user projection, as the identity collaborator would
    pub async fn add_user(&self, username: &str, role: Role) -> UserSummary {
        let mut state = self.state.lock().await;
        state.last_user_id += 1;
        let user = UserSummary {
            id: UserId(state.last_user_id),
            username: username.to_string(),
            role,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Arm a one-shot failure
    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.lock().await.push(fault);
    }
}

#[async_trait]
impl CirculationStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            work,
            faults: self.faults.clone(),
        }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl MemoryUnitOfWork {
    async fn trip(&self, fault: Fault) -> AppResult<()> {
        let mut faults = self.faults.lock().await;
        if let Some(pos) = faults.iter().position(|f| *f == fault) {
            faults.remove(pos);
            return Err(AppError::Storage(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }

    fn book_mut(&mut self, book_id: BookId) -> AppResult<&mut Book> {
        self.work
            .books
            .get_mut(&book_id)
            .ok_or(AppError::NotFound(Resource::Book, book_id.raw()))
    }
}

fn newest_first(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(b.id.cmp(&a.id)));
    loans
}

#[async_trait]
impl BookCatalog for MemoryUnitOfWork {
    async fn find(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        Ok(self.work.books.get(&book_id).cloned())
    }

    async fn list(&mut self) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self.work.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn try_reserve_copy(&mut self, book_id: BookId) -> AppResult<Book> {
        let book = self.book_mut(book_id)?;
        if book.stock <= 0 {
            return Err(AppError::OutOfStock(book_id.raw()));
        }
        book.stock -= 1;
        Ok(book.clone())
    }

    async fn release_copy(&mut self, book_id: BookId) -> AppResult<Book> {
        self.trip(Fault::ReleaseCopy).await?;
        let book = self.book_mut(book_id)?;
        if book.stock >= book.total_copies {
            return Err(AppError::StockCeiling(book_id.raw()));
        }
        book.stock += 1;
        Ok(book.clone())
    }
}

#[async_trait]
impl LoanLedger for MemoryUnitOfWork {
    async fn find_by_id(&mut self, loan_id: LoanId) -> AppResult<Option<Loan>> {
        Ok(self.work.loans.get(&loan_id).cloned())
    }

    async fn find_active_loan(&mut self, book_id: BookId, user_id: UserId) -> AppResult<Option<Loan>> {
        Ok(self
            .work
            .loans
            .values()
            .find(|l| l.book_id == book_id && l.user_id == user_id && l.is_active())
            .cloned())
    }

    async fn create(&mut self, book_id: BookId, user_id: UserId, due_at: DateTime<Utc>) -> AppResult<Loan> {
        self.trip(Fault::CreateLoan).await?;
        if self.find_active_loan(book_id, user_id).await?.is_some() {
            return Err(AppError::DuplicateActiveLoan {
                book_id: book_id.raw(),
                user_id: user_id.raw(),
            });
        }

        self.work.last_loan_id += 1;
        let loan = Loan {
            id: LoanId(self.work.last_loan_id),
            book_id,
            user_id,
            issued_at: Utc::now(),
            due_at,
            returned_at: None,
            status: LoanStatus::Active,
        };
        self.work.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn mark_returned(&mut self, loan_id: LoanId, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let loan = self
            .work
            .loans
            .get_mut(&loan_id)
            .ok_or(AppError::NotFound(Resource::Loan, loan_id.raw()))?;
        if !loan.is_active() {
            return Err(AppError::AlreadyReturned(loan_id.raw()));
        }
        loan.status = LoanStatus::Returned;
        loan.returned_at = Some(returned_at);
        Ok(loan.clone())
    }

    async fn list_all(&mut self) -> AppResult<Vec<Loan>> {
        Ok(newest_first(self.work.loans.values().cloned().collect()))
    }

    async fn list_by_user(&mut self, user_id: UserId) -> AppResult<Vec<Loan>> {
        Ok(newest_first(
            self.work.loans.values().filter(|l| l.user_id == user_id).cloned().collect(),
        ))
    }
}

#[async_trait]
impl UserDirectory for MemoryUnitOfWork {
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserSummary>> {
        Ok(self.work.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.trip(Fault::Commit).await?;
        let MemoryUnitOfWork { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
