//! Repository layer for database operations

pub mod books;
pub mod borrowings;
pub mod tokens;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub borrowings: borrowings::BorrowingsRepository,
    pub tokens: tokens::TokensRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            borrowings: borrowings::BorrowingsRepository::new(pool.clone()),
            tokens: tokens::TokensRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Postgres unique-constraint violation (SQLSTATE 23505)
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Postgres foreign-key violation (SQLSTATE 23503)
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

/// Clamp page/limit query values: page >= 1, 1 <= limit <= 100
pub(crate) fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

/// Build an ORDER BY clause from a client sort expression.
///
/// Accepts `-field` (descending), `field:asc|desc` and plain `field`.
/// Field names resolve through the whitelist; anything unknown falls
/// back to the default clause.
pub(crate) fn order_by_clause(
    sort: Option<&str>,
    columns: &[(&str, &str)],
    default: &str,
) -> String {
    let Some(sort) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
        return default.to_string();
    };

    let (field, descending) = if let Some(rest) = sort.strip_prefix('-') {
        (rest, true)
    } else if let Some((field, dir)) = sort.split_once(':') {
        (field, dir.eq_ignore_ascii_case("desc"))
    } else {
        (sort, false)
    };

    match columns.iter().find(|(name, _)| *name == field) {
        Some((_, column)) => {
            format!("{} {}", column, if descending { "DESC" } else { "ASC" })
        }
        None => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[(&str, &str)] = &[
        ("borrowedAt", "b.borrowed_at"),
        ("dueDate", "b.due_date"),
        ("title", "bk.title"),
    ];

    #[test]
    fn order_by_handles_all_formats() {
        let default = "b.borrowed_at DESC";
        assert_eq!(
            order_by_clause(Some("-borrowedAt"), COLUMNS, default),
            "b.borrowed_at DESC"
        );
        assert_eq!(
            order_by_clause(Some("dueDate:desc"), COLUMNS, default),
            "b.due_date DESC"
        );
        assert_eq!(
            order_by_clause(Some("dueDate:asc"), COLUMNS, default),
            "b.due_date ASC"
        );
        assert_eq!(order_by_clause(Some("title"), COLUMNS, default), "bk.title ASC");
    }

    #[test]
    fn order_by_rejects_unknown_fields() {
        let default = "b.borrowed_at DESC";
        // whitelisted mapping only; injection attempts fall back
        assert_eq!(
            order_by_clause(Some("borrowed_at; DROP TABLE"), COLUMNS, default),
            default
        );
        assert_eq!(order_by_clause(None, COLUMNS, default), default);
        assert_eq!(order_by_clause(Some("  "), COLUMNS, default), default);
    }

    #[test]
    fn page_window_clamps_inputs() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(page_window(Some(3), Some(250)), (3, 100, 200));
        assert_eq!(page_window(Some(-5), Some(50)), (1, 50, 0));
    }
}
