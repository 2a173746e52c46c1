//! Book catalog queries for the PostgreSQL store

use async_trait::async_trait;

use super::{postgres::PgUnitOfWork, BookCatalog};
use crate::{
    error::{AppError, AppResult},
    models::{book::Book, id::BookId},
};

const BOOK_COLUMNS: &str = "id, title, author, isbn, stock, total_copies";

#[async_trait]
impl BookCatalog for PgUnitOfWork {
    async fn find(&mut self, book_id: BookId) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn list(&mut self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books ORDER BY title, id", BOOK_COLUMNS))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(books)
    }

    async fn try_reserve_copy(&mut self, book_id: BookId) -> AppResult<Book> {
        // Check and decrement in one statement
        let reserved = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET stock = stock - 1 WHERE id = $1 AND stock > 0 RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match reserved {
            Some(book) => Ok(book),
            None => {
                // Either the book is missing or the shelf is empty
                BookCatalog::get(self, book_id).await?;
                Err(AppError::OutOfStock(book_id.raw()))
            }
        }
    }

    async fn release_copy(&mut self, book_id: BookId) -> AppResult<Book> {
        let released = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET stock = stock + 1 WHERE id = $1 AND stock < total_copies RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match released {
            Some(book) => Ok(book),
            None => {
                BookCatalog::get(self, book_id).await?;
                Err(AppError::StockCeiling(book_id.raw()))
            }
        }
    }
}
