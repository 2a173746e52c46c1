//! Book model: the copy-count ledger entry for one title

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::id::BookId;

/// Book as stored in the catalog.
///
/// `stock` is the number of copies on the shelf right now and always stays
/// within `0..=total_copies`. Availability is derived from it and is never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub stock: i32,
    pub total_copies: i32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
        }
    }
}

/// Book representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookView {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub stock: i32,
    pub total_copies: i32,
    /// True iff at least one copy is on the shelf
    pub available: bool,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        let available = book.is_available();
        BookView {
            id: book.id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            stock: book.stock,
            total_copies: book.total_copies,
            available,
        }
    }
}

/// Read-only projection of a book attached to loan listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: BookId,
    pub title: String,
    pub author: String,
}
