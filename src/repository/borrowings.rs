//! Borrowings repository for database operations
//!
//! Issue and return each run inside a transaction so the loan record and
//! the book's `available_copies` move together. Availability is checked
//! with a conditional decrement rather than a read-then-write, and the
//! partial unique index on active (book, user) pairs turns concurrent
//! duplicate issues into constraint violations instead of oversells.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookSummary,
        borrowing::{
            status_at, BorrowerSummary, Borrowing, BorrowingDetails, BorrowingQuery,
            BorrowingStatus,
        },
    },
};

use super::{is_foreign_key_violation, is_unique_violation, order_by_clause, page_window};

/// Whitelisted sort fields for borrowing listings
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("borrowedAt", "b.borrowed_at"),
    ("dueDate", "b.due_date"),
    ("returnedAt", "b.returned_at"),
    ("createdAt", "b.created_at"),
];

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.borrowed_at, b.due_date, b.returned_at,
           bk.id AS book_id, bk.title, bk.author, bk.isbn,
           bk.copies, bk.available_copies,
           u.id AS borrower_id, u.fullname, u.email, u.role
    FROM borrowings b
    JOIN books bk ON b.book_id = bk.id
    JOIN users u ON b.user_id = u.id
"#;

fn details_from_row(row: &PgRow, now: DateTime<Utc>) -> Result<BorrowingDetails, sqlx::Error> {
    let returned_at: Option<DateTime<Utc>> = row.try_get("returned_at")?;
    let due_date: DateTime<Utc> = row.try_get("due_date")?;

    Ok(BorrowingDetails {
        id: row.try_get("id")?,
        book: BookSummary {
            id: row.try_get("book_id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            isbn: row.try_get("isbn")?,
            copies: row.try_get("copies")?,
            available_copies: row.try_get("available_copies")?,
        },
        user: BorrowerSummary {
            id: row.try_get("borrower_id")?,
            fullname: row.try_get("fullname")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
        },
        borrowed_at: row.try_get("borrowed_at")?,
        due_date,
        returned_at,
        status: status_at(returned_at, due_date, now),
    })
}

#[derive(Clone)]
pub struct BorrowingsRepository {
    pool: Pool<Postgres>,
}

impl BorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Issue a book: atomically decrement availability and create the
    /// loan record. Fails without side effects when no copy is left or
    /// the user already holds an active loan on this book.
    pub async fn issue(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        due_date: DateTime<Utc>,
    ) -> AppResult<Borrowing> {
        let mut tx = self.pool.begin().await?;

        // Conditional decrement: only succeeds while a copy remains
        let decremented = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = now()
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                    .bind(book_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                AppError::Conflict("No copies available to borrow".to_string())
            } else {
                AppError::NotFound("Book not found".to_string())
            });
        }

        let inserted = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (book_id, user_id, due_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await;

        // Dropping the transaction on the error paths rolls the
        // decrement back.
        let borrowing = match inserted {
            Ok(b) => b,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Conflict(
                    "User already has this book borrowed".to_string(),
                ));
            }
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(borrowing)
    }

    /// Close a loan: stamp the return and put the copy back on the
    /// shelf, capped at the total copy count (a manual copies edit may
    /// have shrunk the inventory while the loan was out).
    pub async fn return_loan(&self, id: Uuid) -> AppResult<Borrowing> {
        let mut tx = self.pool.begin().await?;

        let returned = sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings
            SET returned_at = now(), updated_at = now()
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(borrowing) = returned else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrowings WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                AppError::Conflict("Book already returned".to_string())
            } else {
                AppError::NotFound("Borrowing record not found".to_string())
            });
        };

        sqlx::query(
            r#"
            UPDATE books
            SET available_copies = LEAST(available_copies + 1, copies), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(borrowing.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(borrowing)
    }

    /// Get a borrowing with joined book and borrower details
    pub async fn get_details(&self, id: Uuid) -> AppResult<BorrowingDetails> {
        let query = format!("{} WHERE b.id = $1", DETAILS_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrowing not found".to_string()))?;

        Ok(details_from_row(&row, Utc::now())?)
    }

    /// Search borrowings with pagination.
    ///
    /// `scope_user` pins the result set to one borrower and overrides
    /// any client-supplied user filter.
    pub async fn search(
        &self,
        scope_user: Option<Uuid>,
        query: &BorrowingQuery,
    ) -> AppResult<(Vec<BorrowingDetails>, i64)> {
        let (_, limit, offset) = page_window(query.page, query.limit);
        let now = Utc::now();

        let mut conditions = Vec::new();
        let mut param_idx = 1;

        let user_filter = scope_user.or(query.user_id);
        if user_filter.is_some() {
            conditions.push(format!("b.user_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.book_id.is_some() {
            conditions.push(format!("b.book_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.q.is_some() {
            conditions.push(format!(
                "(bk.title ILIKE ${} OR u.fullname ILIKE ${} OR u.email ILIKE ${})",
                param_idx, param_idx, param_idx
            ));
            param_idx += 1;
        }
        let _ = param_idx;

        // Derived status maps onto date predicates, not a stored column
        match query.status {
            Some(BorrowingStatus::Active) => {
                conditions.push("b.returned_at IS NULL AND b.due_date >= now()".to_string());
            }
            Some(BorrowingStatus::Overdue) => {
                conditions.push("b.returned_at IS NULL AND b.due_date < now()".to_string());
            }
            Some(BorrowingStatus::Returned) => {
                conditions.push("b.returned_at IS NOT NULL".to_string());
            }
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let pattern = query.q.as_ref().map(|q| format!("%{}%", q.trim()));

        // Count total
        let count_query = format!(
            r#"
            SELECT COUNT(*)
            FROM borrowings b
            JOIN books bk ON b.book_id = bk.id
            JOIN users u ON b.user_id = u.id
            {}
            "#,
            where_clause
        );
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(user_id) = user_filter {
            count_builder = count_builder.bind(user_id);
        }
        if let Some(book_id) = query.book_id {
            count_builder = count_builder.bind(book_id);
        }
        if let Some(ref pattern) = pattern {
            count_builder = count_builder.bind(pattern);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let order_by = order_by_clause(query.sort.as_deref(), SORT_COLUMNS, "b.borrowed_at DESC");
        let select_query = format!(
            "{} {} ORDER BY {} LIMIT {} OFFSET {}",
            DETAILS_SELECT, where_clause, order_by, limit, offset
        );

        let mut select_builder = sqlx::query(&select_query);
        if let Some(user_id) = user_filter {
            select_builder = select_builder.bind(user_id);
        }
        if let Some(book_id) = query.book_id {
            select_builder = select_builder.bind(book_id);
        }
        if let Some(ref pattern) = pattern {
            select_builder = select_builder.bind(pattern);
        }
        let rows = select_builder.fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, now)?);
        }

        Ok((items, total))
    }
}
