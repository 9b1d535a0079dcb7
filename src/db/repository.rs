//! Database repository for CRUD operations.
//!
//! Every query takes the owner id and filters at query-construction time, so
//! records belonging to another user are indistinguishable from absent ones.
//! Uses prepared statements and transactions for data integrity.

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{
    Attribute, AttributeKind, AttributeName, Book, Category, CreateBookRequest, CreateUserRequest,
    UpdateBookRequest, User,
};

/// Maximum length for short text columns (title, author, language, link, names).
const MAX_TEXT_LEN: usize = 255;

/// Relation filters for book listing. Within one filter the ids are OR-ed;
/// both filters together are AND-ed.
#[derive(Debug, Clone, Default)]
pub struct BookFilters {
    pub tag_ids: Option<Vec<i64>>,
    pub review_ids: Option<Vec<i64>>,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a new user with an already-hashed password.
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (email, name, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&request.email)
        .bind(&request.name)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::validation_field(
                    "email",
                    "A user with this email already exists",
                ));
            }
            other => other?,
        };

        Ok(User {
            id: result.last_insert_rowid(),
            email: request.email.clone(),
            name: request.name.clone(),
            created_at: now,
        })
    }

    /// Get a user and their password hash by email, for credential checks.
    pub async fn get_user_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let hash: String = row.get("password_hash");
            (user_from_row(&row), hash)
        }))
    }

    /// Store an API token digest for a user.
    pub async fn create_token(&self, user_id: i64, token_hash: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO tokens (token_hash, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(user_id)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resolve a token digest to its user, if any.
    pub async fn get_user_by_token(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.name, u.created_at \
             FROM tokens t JOIN users u ON u.id = t.user_id \
             WHERE t.token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    // ==================== ATTRIBUTE OPERATIONS ====================

    /// List a user's attributes of one kind, ordered by name descending.
    /// With `assigned_only`, restrict to attributes linked to at least one of
    /// the user's books, deduplicated.
    pub async fn list_attributes(
        &self,
        kind: AttributeKind,
        user_id: i64,
        assigned_only: bool,
    ) -> Result<Vec<Attribute>, AppError> {
        let rows = if assigned_only {
            let sql = format!(
                "SELECT DISTINCT a.id, a.name FROM {table} a \
                 JOIN {link} l ON l.{col} = a.id \
                 JOIN books b ON b.id = l.book_id \
                 WHERE a.user_id = ? AND b.user_id = ? \
                 ORDER BY a.name DESC",
                table = kind.table(),
                link = kind.link_table(),
                col = kind.link_column(),
            );
            sqlx::query(&sql)
                .bind(user_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT id, name FROM {} WHERE user_id = ? ORDER BY name DESC",
                kind.table()
            );
            sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?
        };

        Ok(rows.iter().map(attribute_from_row).collect())
    }

    /// Rename an attribute.
    pub async fn update_attribute(
        &self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
        name: &str,
    ) -> Result<Attribute, AppError> {
        validate_attribute_name(kind, name)?;

        let sql = format!(
            "UPDATE {} SET name = ? WHERE id = ? AND user_id = ?",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        let result = match result {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::validation_field(
                    "name",
                    format!("{} named {:?} already exists", kind.label(), name),
                ));
            }
            other => other?,
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                kind.label(),
                id
            )));
        }

        Ok(Attribute {
            id,
            name: name.to_string(),
        })
    }

    /// Delete an attribute. Link rows cascade away; books are untouched.
    pub async fn delete_attribute(
        &self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE id = ? AND user_id = ?", kind.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                kind.label(),
                id
            )));
        }

        Ok(())
    }

    // ==================== BOOK OPERATIONS ====================

    /// List a user's books, newest first, optionally restricted to books
    /// linked to any of the given tag/review ids.
    pub async fn list_books(
        &self,
        user_id: i64,
        filters: &BookFilters,
    ) -> Result<Vec<Book>, AppError> {
        let mut sql = String::from(
            "SELECT id, title, author, description, category, number_of_pages, \
                    language, cost, link, image_path \
             FROM books WHERE user_id = ?",
        );
        if let Some(ids) = &filters.tag_ids {
            sql.push_str(&format!(
                " AND id IN (SELECT book_id FROM book_tags WHERE tag_id IN ({}))",
                placeholders(ids.len())
            ));
        }
        if let Some(ids) = &filters.review_ids {
            sql.push_str(&format!(
                " AND id IN (SELECT book_id FROM book_reviews WHERE review_id IN ({}))",
                placeholders(ids.len())
            ));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut query = sqlx::query(&sql).bind(user_id);
        for id in filters.tag_ids.iter().flatten() {
            query = query.bind(id);
        }
        for id in filters.review_ids.iter().flatten() {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut books = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.get("id");
            let tags = self.book_attributes(AttributeKind::Tag, id).await?;
            let reviews = self.book_attributes(AttributeKind::Review, id).await?;
            books.push(book_from_row(row, tags, reviews)?);
        }
        Ok(books)
    }

    /// Get a book by id, scoped to its owner.
    pub async fn get_book(&self, id: i64, user_id: i64) -> Result<Option<Book>, AppError> {
        let row = sqlx::query(
            "SELECT id, title, author, description, category, number_of_pages, \
                    language, cost, link, image_path \
             FROM books WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let tags = self.book_attributes(AttributeKind::Tag, id).await?;
                let reviews = self.book_attributes(AttributeKind::Review, id).await?;
                Ok(Some(book_from_row(&row, tags, reviews)?))
            }
        }
    }

    /// Create a new book with its attribute links in one transaction.
    pub async fn create_book(
        &self,
        user_id: i64,
        request: &CreateBookRequest,
    ) -> Result<Book, AppError> {
        let category = validate_create_book(request)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO books (user_id, title, author, description, category, \
                                number_of_pages, language, cost, link) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&request.title)
        .bind(&request.author)
        .bind(&request.description)
        .bind(category.as_str())
        .bind(request.number_of_pages)
        .bind(&request.language)
        .bind(&request.cost)
        .bind(&request.link)
        .execute(&mut *tx)
        .await?;
        let book_id = result.last_insert_rowid();

        let empty = Vec::new();
        reconcile_attributes(
            &mut tx,
            AttributeKind::Tag,
            user_id,
            book_id,
            request.tags.as_ref().unwrap_or(&empty),
        )
        .await?;
        reconcile_attributes(
            &mut tx,
            AttributeKind::Review,
            user_id,
            book_id,
            request.reviews.as_ref().unwrap_or(&empty),
        )
        .await?;

        tx.commit().await?;

        self.get_book(book_id, user_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Book {} missing after create", book_id))
        })
    }

    /// Update a book. Only provided fields change; a present `tags`/`reviews`
    /// key replaces the whole link set for that kind. With `partial` unset,
    /// the non-optional base fields must all be present.
    pub async fn update_book(
        &self,
        id: i64,
        user_id: i64,
        request: &UpdateBookRequest,
        partial: bool,
    ) -> Result<Book, AppError> {
        let category = validate_update_book(request, partial)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, title, author, description, category, number_of_pages, \
                    language, cost, link, image_path \
             FROM books WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        let existing_category: String = row.get("category");
        let existing_pages: i64 = row.get("number_of_pages");
        let existing_title: String = row.get("title");
        let existing_author: String = row.get("author");
        let existing_description: String = row.get("description");
        let existing_language: String = row.get("language");
        let existing_cost: Option<String> = row.get("cost");
        let existing_link: String = row.get("link");

        let title = request.title.clone().unwrap_or(existing_title);
        let author = request.author.clone().unwrap_or(existing_author);
        let description = request.description.clone().unwrap_or(existing_description);
        let category = match category {
            Some(c) => c.as_str().to_string(),
            None => existing_category,
        };
        let number_of_pages = request.number_of_pages.unwrap_or(existing_pages);
        let language = request.language.clone().unwrap_or(existing_language);
        let cost = request.cost.clone().or(existing_cost);
        let link = request.link.clone().unwrap_or(existing_link);

        sqlx::query(
            "UPDATE books SET title = ?, author = ?, description = ?, category = ?, \
                              number_of_pages = ?, language = ?, cost = ?, link = ? \
             WHERE id = ? AND user_id = ?",
        )
        .bind(&title)
        .bind(&author)
        .bind(&description)
        .bind(&category)
        .bind(number_of_pages)
        .bind(&language)
        .bind(&cost)
        .bind(&link)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if let Some(names) = &request.tags {
            clear_links(&mut tx, AttributeKind::Tag, id).await?;
            reconcile_attributes(&mut tx, AttributeKind::Tag, user_id, id, names).await?;
        }
        if let Some(names) = &request.reviews {
            clear_links(&mut tx, AttributeKind::Review, id).await?;
            reconcile_attributes(&mut tx, AttributeKind::Review, user_id, id, names).await?;
        }

        tx.commit().await?;

        self.get_book(id, user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Book {} missing after update", id)))
    }

    /// Delete a book, returning its stored image reference for blob cleanup.
    pub async fn delete_book(&self, id: i64, user_id: i64) -> Result<Option<String>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT image_path FROM books WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        let image_path: Option<String> = row.get("image_path");

        sqlx::query("DELETE FROM books WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(image_path)
    }

    /// Point a book at a new image reference, returning the replaced one.
    pub async fn set_book_image(
        &self,
        id: i64,
        user_id: i64,
        image_path: &str,
    ) -> Result<Option<String>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT image_path FROM books WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        let previous: Option<String> = row.get("image_path");

        sqlx::query("UPDATE books SET image_path = ? WHERE id = ? AND user_id = ?")
            .bind(image_path)
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// Attributes linked to one book, ordered by name.
    async fn book_attributes(
        &self,
        kind: AttributeKind,
        book_id: i64,
    ) -> Result<Vec<Attribute>, AppError> {
        let sql = format!(
            "SELECT a.id, a.name FROM {table} a \
             JOIN {link} l ON l.{col} = a.id \
             WHERE l.book_id = ? ORDER BY a.name",
            table = kind.table(),
            link = kind.link_table(),
            col = kind.link_column(),
        );
        let rows = sqlx::query(&sql).bind(book_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(attribute_from_row).collect())
    }
}

// ==================== RECONCILIATION ====================

/// Resolve each requested name to exactly one attribute row owned by the user
/// (reusing an exact match or creating a new row) and link it to the book.
/// Duplicate names in the input collapse to one link; processing is
/// order-insensitive. Runs inside the enclosing book transaction.
async fn reconcile_attributes(
    tx: &mut Transaction<'_, Sqlite>,
    kind: AttributeKind,
    user_id: i64,
    book_id: i64,
    names: &[AttributeName],
) -> Result<(), AppError> {
    let mut seen: Vec<&str> = Vec::new();
    for entry in names {
        if seen.contains(&entry.name.as_str()) {
            continue;
        }
        seen.push(&entry.name);

        let attribute = get_or_create_attribute(tx, kind, user_id, &entry.name).await?;

        let sql = format!(
            "INSERT OR IGNORE INTO {} (book_id, {}) VALUES (?, ?)",
            kind.link_table(),
            kind.link_column()
        );
        sqlx::query(&sql)
            .bind(book_id)
            .bind(attribute.id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Exact-match lookup scoped to the owner, creating the row if absent.
/// A concurrent duplicate insert loses to the unique index; the follow-up
/// select is the single internal retry before surfacing a conflict.
async fn get_or_create_attribute(
    tx: &mut Transaction<'_, Sqlite>,
    kind: AttributeKind,
    user_id: i64,
    name: &str,
) -> Result<Attribute, AppError> {
    let select_sql = format!(
        "SELECT id, name FROM {} WHERE user_id = ? AND name = ?",
        kind.table()
    );
    if let Some(row) = sqlx::query(&select_sql)
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?
    {
        return Ok(attribute_from_row(&row));
    }

    let insert_sql = format!(
        "INSERT INTO {} (user_id, name) VALUES (?, ?) ON CONFLICT(user_id, name) DO NOTHING",
        kind.table()
    );
    sqlx::query(&insert_sql)
        .bind(user_id)
        .bind(name)
        .execute(&mut **tx)
        .await?;

    // The row exists now whether this insert or a concurrent one won.
    match sqlx::query(&select_sql)
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?
    {
        Some(row) => Ok(attribute_from_row(&row)),
        None => Err(AppError::Conflict(format!(
            "Could not resolve {} {:?} after concurrent write",
            kind.label(),
            name
        ))),
    }
}

/// Remove all links of one kind from a book, ahead of whole-set replacement.
async fn clear_links(
    tx: &mut Transaction<'_, Sqlite>,
    kind: AttributeKind,
    book_id: i64,
) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE book_id = ?", kind.link_table());
    sqlx::query(&sql).bind(book_id).execute(&mut **tx).await?;
    Ok(())
}

// ==================== VALIDATION ====================

fn validate_create_book(request: &CreateBookRequest) -> Result<Category, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::validation_field("title", "Title is required"));
    }
    if request.language.trim().is_empty() {
        return Err(AppError::validation_field("language", "Language is required"));
    }
    let category = parse_category(&request.category)?;
    validate_text_len("title", &request.title)?;
    validate_text_len("author", &request.author)?;
    validate_text_len("language", &request.language)?;
    validate_text_len("link", &request.link)?;
    if let Some(cost) = &request.cost {
        validate_cost(cost)?;
    }
    if let Some(names) = &request.tags {
        validate_attribute_names(AttributeKind::Tag, names)?;
    }
    if let Some(names) = &request.reviews {
        validate_attribute_names(AttributeKind::Review, names)?;
    }
    Ok(category)
}

fn validate_update_book(
    request: &UpdateBookRequest,
    partial: bool,
) -> Result<Option<Category>, AppError> {
    if !partial {
        for (field, present) in [
            ("title", request.title.is_some()),
            ("category", request.category.is_some()),
            ("numberOfPages", request.number_of_pages.is_some()),
            ("language", request.language.is_some()),
        ] {
            if !present {
                return Err(AppError::validation_field(
                    field,
                    format!("{} is required for a full update", field),
                ));
            }
        }
    }

    if let Some(title) = &request.title {
        if title.trim().is_empty() {
            return Err(AppError::validation_field("title", "Title must not be empty"));
        }
        validate_text_len("title", title)?;
    }
    if let Some(language) = &request.language {
        if language.trim().is_empty() {
            return Err(AppError::validation_field(
                "language",
                "Language must not be empty",
            ));
        }
        validate_text_len("language", language)?;
    }
    if let Some(author) = &request.author {
        validate_text_len("author", author)?;
    }
    if let Some(link) = &request.link {
        validate_text_len("link", link)?;
    }
    if let Some(cost) = &request.cost {
        validate_cost(cost)?;
    }
    if let Some(names) = &request.tags {
        validate_attribute_names(AttributeKind::Tag, names)?;
    }
    if let Some(names) = &request.reviews {
        validate_attribute_names(AttributeKind::Review, names)?;
    }

    match &request.category {
        Some(s) => Ok(Some(parse_category(s)?)),
        None => Ok(None),
    }
}

fn parse_category(s: &str) -> Result<Category, AppError> {
    Category::from_str(s)
        .ok_or_else(|| AppError::validation_field("category", format!("Invalid category {:?}", s)))
}

fn validate_text_len(field: &str, value: &str) -> Result<(), AppError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::validation_field(
            field,
            format!("{} must be at most {} characters", field, MAX_TEXT_LEN),
        ));
    }
    Ok(())
}

/// Cost is a decimal with at most 5 digits, 2 of them fractional.
fn validate_cost(cost: &str) -> Result<(), AppError> {
    let (int_part, frac_part) = match cost.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cost, ""),
    };
    let digits_only = !int_part.is_empty()
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    if !digits_only || frac_part.len() > 2 || int_part.len() + frac_part.len() > 5 {
        return Err(AppError::validation_field(
            "cost",
            "Cost must be a decimal with at most 5 digits and 2 decimal places",
        ));
    }
    Ok(())
}

fn validate_attribute_names(kind: AttributeKind, names: &[AttributeName]) -> Result<(), AppError> {
    for entry in names {
        validate_attribute_name(kind, &entry.name)?;
    }
    Ok(())
}

fn validate_attribute_name(kind: AttributeKind, name: &str) -> Result<(), AppError> {
    let field = match kind {
        AttributeKind::Tag => "tags",
        AttributeKind::Review => "reviews",
    };
    if name.trim().is_empty() {
        return Err(AppError::validation_field(
            field,
            format!("{} name must not be empty", kind.label()),
        ));
    }
    validate_text_len(field, name)
}

// ==================== ROW CONVERSION ====================

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn attribute_from_row(row: &sqlx::sqlite::SqliteRow) -> Attribute {
    Attribute {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn book_from_row(
    row: &sqlx::sqlite::SqliteRow,
    tags: Vec<Attribute>,
    reviews: Vec<Attribute>,
) -> Result<Book, AppError> {
    let category_str: String = row.get("category");
    let category = Category::from_str(&category_str).ok_or_else(|| {
        AppError::Internal(format!("Unknown category {:?} in store", category_str))
    })?;

    Ok(Book {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        description: row.get("description"),
        category,
        number_of_pages: row.get("number_of_pages"),
        language: row.get("language"),
        cost: row.get("cost"),
        link: row.get("link"),
        image: row.get("image_path"),
        tags,
        reviews,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
