//! Users repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateProfileRequest, User, UserQuery},
};

use super::{is_unique_violation, order_by_clause, page_window};

/// Whitelisted sort fields for user listings
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("fullname", "fullname"),
    ("email", "email"),
    ("role", "role"),
];

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Find user by normalized email
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Check if a college/student ID already exists
    pub async fn college_id_exists(&self, college_user_id: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE college_user_id = $1)")
                .bind(college_user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Check whether another user already holds any of the given unique
    /// identity fields (used before profile updates)
    pub async fn identity_conflict_exists(
        &self,
        exclude_id: Uuid,
        email: Option<&str>,
        mobile_number: Option<&str>,
        college_user_id: Option<&str>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE id != $1
                  AND (($2::text IS NOT NULL AND email = LOWER($2))
                    OR ($3::text IS NOT NULL AND mobile_number = $3)
                    OR ($4::text IS NOT NULL AND college_user_id = $4))
            )
            "#,
        )
        .bind(exclude_id)
        .bind(email)
        .bind(mobile_number)
        .bind(college_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a new user
    pub async fn create(
        &self,
        fullname: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        mobile_number: Option<&str>,
        college_user_id: Option<&str>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (fullname, email, password_hash, role, mobile_number, college_user_id)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(fullname)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(mobile_number)
        .bind(college_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Duplicate field value".to_string())
            } else {
                e.into()
            }
        })
    }

    /// Update own profile fields
    pub async fn update_profile(
        &self,
        id: Uuid,
        profile: &UpdateProfileRequest,
    ) -> AppResult<User> {
        // Build dynamic update query
        let mut sets = Vec::new();
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(profile.fullname, "fullname");
        if profile.email.is_some() {
            sets.push(format!("email = LOWER(${})", param_idx));
            param_idx += 1;
        }
        add_field!(profile.mobile_number, "mobile_number");
        add_field!(profile.college_user_id, "college_user_id");

        if sets.is_empty() {
            return self.get_by_id(id).await;
        }
        let _ = param_idx;

        let query = format!(
            "UPDATE users SET {} WHERE id = $1 RETURNING *",
            sets.join(", ")
        );

        let mut builder = sqlx::query_as::<_, User>(&query).bind(id);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(profile.fullname);
        bind_field!(profile.email);
        bind_field!(profile.mobile_number);
        bind_field!(profile.college_user_id);

        builder
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Conflicting user data".to_string())
                } else {
                    AppError::from(e)
                }
            })?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Replace a user's password hash
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    /// Delete a user
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let (_, limit, offset) = page_window(query.page, query.limit);

        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if query.role.is_some() {
            conditions.push(format!("role = ${}", param_idx));
            param_idx += 1;
        }
        if query.q.is_some() {
            conditions.push(format!(
                "(fullname ILIKE ${} OR email ILIKE ${})",
                param_idx, param_idx
            ));
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
        let count_query = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(role) = query.role {
            count_builder = count_builder.bind(role);
        }
        if let Some(ref pattern) = pattern {
            count_builder = count_builder.bind(pattern);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let order_by = order_by_clause(query.sort.as_deref(), SORT_COLUMNS, "created_at DESC");
        let select_query = format!(
            "SELECT * FROM users {} ORDER BY {} LIMIT {} OFFSET {}",
            where_clause, order_by, limit, offset
        );

        let mut select_builder = sqlx::query_as::<_, User>(&select_query);
        if let Some(role) = query.role {
            select_builder = select_builder.bind(role);
        }
        if let Some(ref pattern) = pattern {
            select_builder = select_builder.bind(pattern);
        }
        let users = select_builder.fetch_all(&self.pool).await?;

        Ok((users, total))
    }
}
