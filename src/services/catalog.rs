//! Read-only catalog browsing

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{book::Book, id::BookId},
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CirculationStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CirculationStore>) -> Self {
        Self { store }
    }

    pub async fn get_book(&self, book_id: BookId) -> AppResult<Book> {
        let mut uow = self.store.begin().await?;
        let book = uow.get(book_id).await?;
        uow.rollback().await?;
        Ok(book)
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        let mut uow = self.store.begin().await?;
        let books = uow.list().await?;
        uow.rollback().await?;
        Ok(books)
    }
}
