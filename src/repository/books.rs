//! Books repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

use super::{is_unique_violation, order_by_clause, page_window};

/// Whitelisted sort fields for book listings
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("title", "title"),
    ("author", "author"),
    ("publishedDate", "published_date"),
    ("copies", "copies"),
    ("availableCopies", "available_copies"),
];

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Check if an ISBN is already taken by another book
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new book; new entries start fully available
    pub async fn create(&self, book: &CreateBook, created_by: Uuid) -> AppResult<Book> {
        let copies = book.copies.unwrap_or(1);

        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author, isbn, description, publisher, published_date,
                copies, available_copies, tags, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(book.title.trim())
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.publisher)
        .bind(book.published_date)
        .bind(copies)
        .bind(book.tags.clone().unwrap_or_default())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Book with this ISBN already exists".to_string())
            } else {
                e.into()
            }
        })
    }

    /// Update an existing book.
    ///
    /// When `copies` shrinks below the current `available_copies`, the
    /// latter is clamped down in the same statement so the
    /// `available_copies <= copies` bound never breaks.
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        let mut sets = vec!["updated_at = now()".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(book.title, "title");
        add_field!(book.author, "author");
        add_field!(book.isbn, "isbn");
        add_field!(book.description, "description");
        add_field!(book.publisher, "publisher");
        add_field!(book.published_date, "published_date");
        if book.copies.is_some() {
            sets.push(format!("copies = ${}", param_idx));
            sets.push(format!("available_copies = LEAST(available_copies, ${})", param_idx));
            param_idx += 1;
        }
        add_field!(book.tags, "tags");
        let _ = param_idx;

        let query = format!(
            "UPDATE books SET {} WHERE id = $1 RETURNING *",
            sets.join(", ")
        );

        let mut builder = sqlx::query_as::<_, Book>(&query).bind(id);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(book.title);
        bind_field!(book.author);
        bind_field!(book.isbn);
        bind_field!(book.description);
        bind_field!(book.publisher);
        bind_field!(book.published_date);
        bind_field!(book.copies);
        bind_field!(book.tags);

        builder
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Book with this ISBN already exists".to_string())
                } else {
                    AppError::from(e)
                }
            })?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Delete a book
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        Ok(())
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, limit, offset) = page_window(query.page, query.limit);

        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if query.q.is_some() {
            conditions.push(format!(
                "(title ILIKE ${} OR author ILIKE ${} OR isbn ILIKE ${})",
                param_idx, param_idx, param_idx
            ));
            param_idx += 1;
        }

        let tags = query.tag_list();
        if !tags.is_empty() {
            conditions.push(format!("tags && ${}", param_idx));
            param_idx += 1;
        }
        let _ = param_idx;

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let pattern = query.q.as_ref().map(|q| format!("%{}%", q.trim()));

        // Count total
        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(ref pattern) = pattern {
            count_builder = count_builder.bind(pattern);
        }
        if !tags.is_empty() {
            count_builder = count_builder.bind(&tags);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let order_by = order_by_clause(query.sort.as_deref(), SORT_COLUMNS, "created_at DESC");
        let select_query = format!(
            "SELECT * FROM books {} ORDER BY {} LIMIT {} OFFSET {}",
            where_clause, order_by, limit, offset
        );

        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        if let Some(ref pattern) = pattern {
            select_builder = select_builder.bind(pattern);
        }
        if !tags.is_empty() {
            select_builder = select_builder.bind(&tags);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }
}
