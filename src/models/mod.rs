//! Data models for the circulation server

pub mod book;
pub mod id;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookSummary, BookView};
pub use id::{BookId, LoanId, UserId};
pub use loan::{AdminIssue, Loan, LoanDetails, LoanStatus};
pub use user::{Identity, Role, UserSummary};
