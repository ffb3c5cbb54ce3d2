//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role (stored as TEXT)
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Capabilities a role grants on the API surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read the book catalog and own loans
    BrowseCatalog,
    /// Create, edit and delete catalog entries
    ManageBooks,
    /// Issue and return books
    ManageLoans,
    /// See every user's loans, not just one's own
    ViewAllLoans,
    /// List user accounts
    ListUsers,
    /// Create and delete user accounts
    ManageUsers,
}

/// Static role -> capability table
pub fn role_capabilities(role: Role) -> &'static [Capability] {
    match role {
        Role::Student => &[Capability::BrowseCatalog],
        Role::Librarian => &[
            Capability::BrowseCatalog,
            Capability::ManageBooks,
            Capability::ManageLoans,
            Capability::ViewAllLoans,
            Capability::ListUsers,
        ],
        Role::Admin => &[
            Capability::BrowseCatalog,
            Capability::ManageBooks,
            Capability::ManageLoans,
            Capability::ViewAllLoans,
            Capability::ListUsers,
            Capability::ManageUsers,
        ],
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub email: String,
    pub mobile_number: Option<String>,
    pub college_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Short user representation returned by auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Build claims for a user with the given lifetime
    pub fn new(user: &User, ttl_minutes: i64) -> Self {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            iat: now,
            exp: now + ttl_minutes * 60,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn can(&self, capability: Capability) -> bool {
        role_capabilities(self.role).contains(&capability)
    }

    /// Require a capability, or fail with a 403
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Insufficient rights for this operation".to_string(),
            ))
        }
    }

    /// Check if the caller may see other users' loans
    pub fn is_privileged(&self) -> bool {
        self.can(Capability::ViewAllLoans)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator privileges required".to_string(),
            ))
        }
    }
}

/// Registration request (students only; role is never client-supplied)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 7, max = 15, message = "Invalid mobile number"))]
    pub mobile_number: Option<String>,
    #[validate(length(min = 1, message = "Student ID is required"))]
    pub college_user_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 4, message = "Invalid code"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 10, message = "Invalid token"))]
    pub token: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "oldPassword is required"))]
    pub old_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Update own profile request (for authenticated users)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub college_user_id: Option<String>,
}

/// Admin: create user with an explicit role (student or librarian)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 2, message = "Full name is required"))]
    pub fullname: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
    pub college_user_id: Option<String>,
}

/// Admin: create a librarian account
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLibrarianRequest {
    #[validate(length(min = 2, message = "Full name is required"))]
    pub fullname: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// User list query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            fullname: "Test User".to_string(),
            password_hash: "x".to_string(),
            role,
            email: "test@example.com".to_string(),
            mobile_number: None,
            college_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn claims_round_trip() {
        let user = sample_user(Role::Librarian);
        let claims = UserClaims::new(&user, 15);
        let token = claims.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, user.id);
        assert_eq!(decoded.role, Role::Librarian);
        assert_eq!(decoded.sub, user.email);
    }

    #[test]
    fn claims_reject_wrong_secret() {
        let user = sample_user(Role::Student);
        let token = UserClaims::new(&user, 15).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn students_cannot_manage_loans() {
        let claims = UserClaims::new(&sample_user(Role::Student), 15);
        assert!(claims.can(Capability::BrowseCatalog));
        assert!(!claims.can(Capability::ManageLoans));
        assert!(!claims.can(Capability::ManageUsers));
        assert!(claims.require(Capability::ManageLoans).is_err());
    }

    #[test]
    fn librarians_manage_loans_but_not_users() {
        let claims = UserClaims::new(&sample_user(Role::Librarian), 15);
        assert!(claims.can(Capability::ManageLoans));
        assert!(claims.can(Capability::ListUsers));
        assert!(!claims.can(Capability::ManageUsers));
        assert!(claims.is_privileged());
        assert!(!claims.is_admin());
    }

    #[test]
    fn admins_hold_every_capability() {
        let claims = UserClaims::new(&sample_user(Role::Admin), 15);
        for capability in [
            Capability::BrowseCatalog,
            Capability::ManageBooks,
            Capability::ManageLoans,
            Capability::ViewAllLoans,
            Capability::ListUsers,
            Capability::ManageUsers,
        ] {
            assert!(claims.can(capability));
        }
    }

    #[test]
    fn role_parses_case_insensitive() {
        assert_eq!("Librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert!("superuser".parse::<Role>().is_err());
    }
}
