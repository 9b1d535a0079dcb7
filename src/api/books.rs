//! Book API endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::db::BookFilters;
use crate::errors::AppError;
use crate::models::{Book, BookSummary, CreateBookRequest, UpdateBookRequest, User};
use crate::AppState;

/// Query parameters for book listing: optional comma-separated id lists.
#[derive(Debug, Deserialize)]
pub struct BookListQuery {
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub reviews: Option<String>,
}

/// GET /api/books - List the requester's books, newest first, optionally
/// filtered to books linked to any of the given tag/review ids.
pub async fn list_books(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<BookListQuery>,
) -> ApiResult<Vec<BookSummary>> {
    let filters = BookFilters {
        tag_ids: parse_id_list("tags", query.tags.as_deref())?,
        review_ids: parse_id_list("reviews", query.reviews.as_deref())?,
    };

    let books = state.repo.list_books(user.id, &filters).await?;
    success(books.into_iter().map(BookSummary::from).collect())
}

/// GET /api/books/:id - Get a single book, including its description.
pub async fn get_book(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<Book> {
    let book = state
        .repo
        .get_book(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
    success(book)
}

/// POST /api/books - Create a new book owned by the requester.
pub async fn create_book(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookRequest>,
) -> ApiResult<Book> {
    let book = state.repo.create_book(user.id, &request).await?;
    tracing::info!("User {} created book {}", user.id, book.id);
    success(book)
}

/// PATCH /api/books/:id - Partially update a book.
pub async fn patch_book(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBookRequest>,
) -> ApiResult<Book> {
    let book = state.repo.update_book(id, user.id, &request, true).await?;
    success(book)
}

/// PUT /api/books/:id - Fully update a book.
pub async fn put_book(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBookRequest>,
) -> ApiResult<Book> {
    let book = state.repo.update_book(id, user.id, &request, false).await?;
    success(book)
}

/// DELETE /api/books/:id - Delete a book and its stored cover blob.
pub async fn delete_book(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let image = state.repo.delete_book(id, user.id).await?;
    if let Some(reference) = image {
        state.images.remove(&reference).await;
    }
    success(())
}

/// POST /api/books/:id/upload-image - Attach a cover image via multipart.
/// A second upload replaces the prior blob.
pub async fn upload_book_image(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Book> {
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() == Some("image") {
            data = Some(field.bytes().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read image field: {}", e))
            })?);
        }
    }

    let data = data.ok_or_else(|| AppError::validation_field("image", "Image file is required"))?;
    if data.is_empty() {
        return Err(AppError::validation_field("image", "Image file is empty"));
    }

    let format = image::guess_format(&data).map_err(|_| {
        AppError::validation_field("image", "Uploaded file is not a recognized image")
    })?;
    let extension = format.extensions_str().first().copied().unwrap_or("bin");

    let reference = state.images.save(id, extension, &data).await?;

    // The blob is written before the ownership check resolves; roll it back
    // if the book turns out to be absent or foreign.
    let previous = match state.repo.set_book_image(id, user.id, &reference).await {
        Ok(previous) => previous,
        Err(e) => {
            state.images.remove(&reference).await;
            return Err(e);
        }
    };
    if let Some(old) = previous {
        state.images.remove(&old).await;
    }

    let book = state
        .repo
        .get_book(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
    success(book)
}

/// Parse a comma-separated id list query value.
fn parse_id_list(field: &str, value: Option<&str>) -> Result<Option<Vec<i64>>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let mut ids = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part.parse::<i64>().map_err(|_| {
            AppError::validation_field(field, format!("Invalid id {:?} in {} filter", part, field))
        })?;
        ids.push(id);
    }
    Ok(Some(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list_absent() {
        assert_eq!(parse_id_list("tags", None).unwrap(), None);
    }

    #[test]
    fn test_parse_id_list_values() {
        assert_eq!(
            parse_id_list("tags", Some("1,2,3")).unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            parse_id_list("tags", Some(" 4 , 5 ")).unwrap(),
            Some(vec![4, 5])
        );
        assert_eq!(parse_id_list("tags", Some("")).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_parse_id_list_rejects_garbage() {
        assert!(parse_id_list("tags", Some("1,abc")).is_err());
        assert!(parse_id_list("reviews", Some("1.5")).is_err());
    }
}
