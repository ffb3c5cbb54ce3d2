//! Session and identity management service
//!
//! Issues short-lived signed access tokens and long-lived rotating
//! refresh tokens, gates registration behind an emailed one-time code,
//! and handles password recovery. Opaque secrets leave this module only
//! once, at creation; the store holds hashes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        token::{generate_otp_code, generate_refresh_secret, generate_reset_secret, hash_secret},
        user::{RegisterRequest, Role, User},
        UserClaims,
    },
    repository::{tokens::NewOtp, Repository},
};

use super::email::EmailService;

/// Access token plus the plaintext refresh secret destined for the
/// cookie. The secret exists only in this value and the client cookie.
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    email: EmailService,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, email: EmailService) -> Self {
        Self {
            repository,
            config,
            email,
        }
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash
    pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Create a signed access token embedding the user's id and role
    fn issue_access_token(&self, user: &User) -> AppResult<String> {
        UserClaims::new(user, self.config.access_token_minutes)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Mint an opaque refresh secret and persist its hash
    async fn issue_refresh_token(&self, user_id: Uuid) -> AppResult<String> {
        let secret = generate_refresh_secret();
        let expires_at = Utc::now() + Duration::days(self.config.refresh_token_days);
        self.repository
            .tokens
            .create_refresh(user_id, &hash_secret(&secret), expires_at)
            .await?;
        Ok(secret)
    }

    /// Open a fresh session for a user: one access token, one refresh
    /// token
    async fn open_session(&self, user: &User) -> AppResult<SessionTokens> {
        Ok(SessionTokens {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user.id).await?,
        })
    }

    /// Authenticate by email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(SessionTokens, User)> {
        let email = normalize_email(email);
        let user = self
            .repository
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !Self::verify_password(&user.password_hash, password)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let tokens = self.open_session(&user).await?;
        Ok((tokens, user))
    }

    /// Exchange a refresh secret for a new access token, rotating the
    /// refresh token. A replayed (already revoked) secret is treated as
    /// credential theft: the user's whole active session set is dropped.
    pub async fn refresh(&self, refresh_secret: Option<&str>) -> AppResult<SessionTokens> {
        let secret = refresh_secret
            .ok_or_else(|| AppError::Authentication("Missing refresh token".to_string()))?;

        let stored = self
            .repository
            .tokens
            .find_refresh_by_hash(&hash_secret(secret))
            .await?
            .ok_or_else(|| {
                AppError::Authentication("Invalid or expired refresh token".to_string())
            })?;

        let now = Utc::now();
        if !stored.is_active_at(now) {
            if stored.revoked_at.is_some() {
                let revoked = self
                    .repository
                    .tokens
                    .revoke_all_for_user(stored.user_id)
                    .await?;
                tracing::warn!(
                    user_id = %stored.user_id,
                    sessions_revoked = revoked,
                    "revoked refresh token replayed; dropping all sessions"
                );
            }
            return Err(AppError::Authentication(
                "Invalid or expired refresh token".to_string(),
            ));
        }

        let user = self
            .repository
            .users
            .get_by_id(stored.user_id)
            .await
            .map_err(|_| AppError::Authentication("User not found for token".to_string()))?;

        let new_secret = self.issue_refresh_token(user.id).await?;
        self.repository
            .tokens
            .rotate_refresh(stored.id, &hash_secret(&new_secret))
            .await?;

        Ok(SessionTokens {
            access_token: self.issue_access_token(&user)?,
            refresh_token: new_secret,
        })
    }

    /// Revoke the presented refresh token. Idempotent: an absent or
    /// unknown secret is not an error.
    pub async fn logout(&self, refresh_secret: Option<&str>) -> AppResult<()> {
        if let Some(secret) = refresh_secret {
            if let Some(stored) = self
                .repository
                .tokens
                .find_refresh_by_hash(&hash_secret(secret))
                .await?
            {
                self.repository.tokens.revoke_refresh(stored.id).await?;
            }
        }
        Ok(())
    }

    /// Drop every active session a user holds
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AppResult<u64> {
        self.repository.tokens.revoke_all_for_user(user_id).await
    }

    /// Start a registration: store the profile with a hashed one-time
    /// code and email the plaintext code. Any earlier pending code for
    /// the same address is superseded.
    pub async fn request_registration(&self, request: &RegisterRequest) -> AppResult<()> {
        let email = normalize_email(&request.email);

        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        self.repository.tokens.invalidate_otps(&email).await?;

        let code = generate_otp_code();
        let otp = NewOtp {
            email: email.clone(),
            fullname: request.fullname.trim().to_string(),
            password_hash: Self::hash_password(&request.password)?,
            mobile_number: request
                .mobile_number
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            college_user_id: Some(request.college_user_id.trim().to_string()),
            code_hash: hash_secret(&code),
            max_attempts: self.config.otp_max_attempts,
            expires_at: Utc::now() + Duration::minutes(self.config.otp_expires_minutes),
        };
        self.repository.tokens.create_otp(&otp).await?;

        self.email.send_otp_code(&email, &code).await?;
        Ok(())
    }

    /// Re-issue a code for a pending registration, carrying the
    /// originally submitted profile forward
    pub async fn resend_registration_otp(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);

        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        // An exhausted attempt counter does not block a resend: the
        // fresh code starts with a clean budget. Only a consumed or
        // expired registration forces a restart.
        let now = Utc::now();
        let pending = self
            .repository
            .tokens
            .latest_pending_otp(&email)
            .await?
            .filter(|otp| otp.used_at.is_none() && otp.expires_at > now)
            .ok_or_else(|| {
                AppError::Validation(
                    "No pending registration or code expired. Please start registration again."
                        .to_string(),
                )
            })?;

        self.repository.tokens.invalidate_otps(&email).await?;

        let code = generate_otp_code();
        let otp = NewOtp {
            email: email.clone(),
            fullname: pending.fullname,
            password_hash: pending.password_hash,
            mobile_number: pending.mobile_number,
            college_user_id: pending.college_user_id,
            code_hash: hash_secret(&code),
            max_attempts: self.config.otp_max_attempts,
            expires_at: now + Duration::minutes(self.config.otp_expires_minutes),
        };
        self.repository.tokens.create_otp(&otp).await?;

        self.email.send_otp_code(&email, &code).await?;
        Ok(())
    }

    /// Verify a registration code and materialize the user.
    ///
    /// Every call counts against the attempt ceiling, whatever the
    /// submitted code looks like, and exhaustion is checked before the
    /// code is compared: a correct code after too many failures still
    /// reads as expired.
    pub async fn verify_registration_otp(
        &self,
        email: &str,
        code: &str,
    ) -> AppResult<(SessionTokens, User)> {
        let email = normalize_email(email);
        let now = Utc::now();

        let pending = self
            .repository
            .tokens
            .latest_pending_otp(&email)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid code".to_string()))?;

        // Count this attempt whatever the outcome, then judge the
        // record as it stood before the increment: a correct code after
        // exhaustion still reads as expired.
        self.repository
            .tokens
            .increment_otp_attempts(pending.id)
            .await?;

        if !pending.is_active_at(now) {
            return Err(AppError::Validation(
                "Code expired or max attempts reached".to_string(),
            ));
        }

        if pending.code_hash != hash_secret(code.trim()) {
            return Err(AppError::Validation("Invalid code".to_string()));
        }

        // A user may have been created for this address since the OTP
        // was requested; re-check before materializing.
        if self.repository.users.email_exists(&email).await? {
            self.repository.tokens.invalidate_otps(&email).await?;
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let user = self
            .repository
            .users
            .create(
                &pending.fullname,
                &email,
                &pending.password_hash,
                Role::Student,
                pending.mobile_number.as_deref(),
                pending.college_user_id.as_deref(),
            )
            .await?;

        self.repository.tokens.invalidate_otps(&email).await?;

        let tokens = self.open_session(&user).await?;
        Ok((tokens, user))
    }

    /// Issue a password reset token. The reply never discloses whether
    /// the address exists.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);

        let Some(user) = self.repository.users.find_by_email(&email).await? else {
            return Ok(());
        };

        let secret = generate_reset_secret();
        let expires_at = Utc::now() + Duration::hours(self.config.reset_token_hours);
        self.repository
            .tokens
            .create_reset(user.id, &hash_secret(&secret), expires_at)
            .await?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.email.frontend_url(),
            secret
        );
        self.email.send_password_reset(&user.email, &reset_url).await?;
        Ok(())
    }

    /// Consume a reset token and set a new password. All of the user's
    /// sessions are dropped.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let now = Utc::now();
        let stored = self
            .repository
            .tokens
            .find_reset_by_hash(&hash_secret(token))
            .await?
            .filter(|t| t.is_active_at(now))
            .ok_or_else(|| AppError::Validation("Invalid or expired token".to_string()))?;

        let user = self.repository.users.get_by_id(stored.user_id).await?;

        let password_hash = Self::hash_password(new_password)?;
        self.repository
            .users
            .update_password(user.id, &password_hash)
            .await?;

        self.repository.tokens.mark_reset_used(stored.id).await?;
        self.revoke_all_sessions(user.id).await?;
        Ok(())
    }

    /// Authenticated password change; drops every session for safety
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.repository.users.get_by_id(user_id).await?;

        if !Self::verify_password(&user.password_hash, old_password)? {
            return Err(AppError::Validation(
                "Invalid current password".to_string(),
            ));
        }

        let password_hash = Self::hash_password(new_password)?;
        self.repository
            .users
            .update_password(user_id, &password_hash)
            .await?;
        self.revoke_all_sessions(user_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = AuthService::hash_password("hunter42").unwrap();
        assert_ne!(hash, "hunter42");
        assert!(AuthService::verify_password(&hash, "hunter42").unwrap());
        assert!(!AuthService::verify_password(&hash, "hunter43").unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = AuthService::hash_password("same-password").unwrap();
        let b = AuthService::hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }
}
