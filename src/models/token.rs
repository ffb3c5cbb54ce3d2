//! Ephemeral credential records: refresh tokens, registration OTPs and
//! password reset tokens.
//!
//! Opaque secrets are never stored; only their SHA-256 digest is
//! persisted, so a leaked table does not yield usable credentials.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// SHA-256 hex digest of an opaque secret
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Generate an opaque refresh secret (48 random bytes, hex encoded)
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; 48];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// Generate a password reset secret (32 random bytes, hex encoded)
pub fn generate_reset_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// Generate a 6-digit one-time code
pub fn generate_otp_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

/// One session grant. Rotation revokes the presented token and records
/// the hash of its replacement, forming a chain usable for breach
/// detection.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by_token_hash: Option<String>,
}

impl RefreshToken {
    /// Active = not revoked and not expired
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// A pending, unconfirmed registration holding the prospective user's
/// profile alongside the hashed one-time code.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationOtp {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub mobile_number: Option<String>,
    pub college_user_id: Option<String>,
    pub code_hash: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationOtp {
    /// Active = unused, unexpired, attempts below the ceiling
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now && self.attempts < self.max_attempts
    }
}

/// Single-use password recovery token
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn hash_secret_is_deterministic_and_distinct() {
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
        // sha256 hex digest length
        assert_eq!(hash_secret("abc").len(), 64);
    }

    #[test]
    fn generated_secrets_do_not_repeat() {
        assert_ne!(generate_refresh_secret(), generate_refresh_secret());
        assert_eq!(generate_refresh_secret().len(), 96);
        assert_eq!(generate_reset_secret().len(), 64);
    }

    #[test]
    fn otp_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    fn otp(attempts: i32, expires_in: Duration, used: bool) -> RegistrationOtp {
        let now = Utc::now();
        RegistrationOtp {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            fullname: "A".to_string(),
            password_hash: "h".to_string(),
            mobile_number: None,
            college_user_id: None,
            code_hash: hash_secret("123456"),
            attempts,
            max_attempts: 5,
            expires_at: now + expires_in,
            used_at: used.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn otp_active_until_attempts_exhausted() {
        let now = Utc::now();
        assert!(otp(0, Duration::minutes(15), false).is_active_at(now));
        assert!(otp(4, Duration::minutes(15), false).is_active_at(now));
        assert!(!otp(5, Duration::minutes(15), false).is_active_at(now));
    }

    #[test]
    fn otp_inactive_when_expired_or_used() {
        let now = Utc::now();
        assert!(!otp(0, Duration::minutes(-1), false).is_active_at(now));
        assert!(!otp(0, Duration::minutes(15), true).is_active_at(now));
    }

    #[test]
    fn refresh_token_inactive_once_revoked() {
        let now = Utc::now();
        let mut token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: hash_secret("t"),
            expires_at: now + Duration::days(7),
            created_at: now,
            revoked_at: None,
            replaced_by_token_hash: None,
        };
        assert!(token.is_active_at(now));
        token.revoked_at = Some(now);
        assert!(!token.is_active_at(now));
    }
}
