//! Catalog browsing endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{book::BookView, id::BookId},
};

use super::extractor::IdPath;

/// List all books with their current stock
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "Catalog", body = Vec<BookView>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<BookView>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books.into_iter().map(BookView::from).collect()))
}

/// Get one book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book", body = BookView),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    IdPath(book_id): IdPath,
) -> AppResult<Json<BookView>> {
    let book = state.services.catalog.get_book(BookId(book_id)).await?;
    Ok(Json(book.into()))
}
