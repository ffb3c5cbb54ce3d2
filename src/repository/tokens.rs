//! Repository for ephemeral credentials: refresh tokens, registration
//! OTPs and password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::token::{PasswordResetToken, RefreshToken, RegistrationOtp},
};

/// Profile captured when a registration OTP is created; materialized
/// into a user on successful verification.
#[derive(Debug, Clone)]
pub struct NewOtp {
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub mobile_number: Option<String>,
    pub college_user_id: Option<String>,
    pub code_hash: String,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokensRepository {
    pool: Pool<Postgres>,
}

impl TokensRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // Refresh tokens

    /// Persist a new refresh token (hash only)
    pub async fn create_refresh(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    /// Look a refresh token up by secret hash
    pub async fn find_refresh_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    /// Revoke a token and record the hash of its replacement
    pub async fn rotate_refresh(&self, id: Uuid, replaced_by_token_hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = now(), replaced_by_token_hash = $2
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(replaced_by_token_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Revoke a single token (logout)
    pub async fn revoke_refresh(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Revoke every active refresh token a user holds; returns how many
    /// sessions were dropped
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // Registration OTPs

    /// Store a new pending registration (code hash only)
    pub async fn create_otp(&self, otp: &NewOtp) -> AppResult<RegistrationOtp> {
        let record = sqlx::query_as::<_, RegistrationOtp>(
            r#"
            INSERT INTO registration_otps (
                email, fullname, password_hash, mobile_number, college_user_id,
                code_hash, max_attempts, expires_at
            ) VALUES (LOWER($1), $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&otp.email)
        .bind(&otp.fullname)
        .bind(&otp.password_hash)
        .bind(&otp.mobile_number)
        .bind(&otp.college_user_id)
        .bind(&otp.code_hash)
        .bind(otp.max_attempts)
        .bind(otp.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Mark every pending OTP for an email as used; a new request always
    /// supersedes earlier ones
    pub async fn invalidate_otps(&self, email: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE registration_otps SET used_at = now() WHERE email = LOWER($1) AND used_at IS NULL",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest pending (unused) OTP for an email; only this one is
    /// relevant for verification
    pub async fn latest_pending_otp(&self, email: &str) -> AppResult<Option<RegistrationOtp>> {
        let record = sqlx::query_as::<_, RegistrationOtp>(
            r#"
            SELECT * FROM registration_otps
            WHERE email = LOWER($1) AND used_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Count one verification attempt; returns the updated counter
    pub async fn increment_otp_attempts(&self, id: Uuid) -> AppResult<i32> {
        let attempts: i32 = sqlx::query_scalar(
            "UPDATE registration_otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(attempts)
    }

    // Password reset tokens

    pub async fn create_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<PasswordResetToken> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    pub async fn find_reset_by_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT * FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    pub async fn mark_reset_used(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE password_reset_tokens SET used_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
