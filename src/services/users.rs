//! User administration and profile service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{
        CreateLibrarianRequest, CreateUserRequest, Role, UpdateProfileRequest, User, UserQuery,
    },
    repository::Repository,
};

use super::auth::AuthService;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Admin: create a user with an explicit role. Admin accounts are
    /// never created through the API.
    pub async fn create_user(&self, request: CreateUserRequest) -> AppResult<User> {
        if request.role == Role::Admin {
            return Err(AppError::Validation(
                "Role must be student or librarian".to_string(),
            ));
        }

        if self.repository.users.email_exists(&request.email).await? {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let college_user_id = request
            .college_user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(college_id) = college_user_id {
            if self.repository.users.college_id_exists(college_id).await? {
                return Err(AppError::Conflict(
                    "College / Student ID already in use".to_string(),
                ));
            }
        }

        let password_hash = AuthService::hash_password(&request.password)?;
        self.repository
            .users
            .create(
                request.fullname.trim(),
                &request.email,
                &password_hash,
                request.role,
                None,
                college_user_id,
            )
            .await
    }

    /// Admin: create a librarian account
    pub async fn create_librarian(&self, request: CreateLibrarianRequest) -> AppResult<User> {
        if self.repository.users.email_exists(&request.email).await? {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = AuthService::hash_password(&request.password)?;
        self.repository
            .users
            .create(
                request.fullname.trim(),
                &request.email,
                &password_hash,
                Role::Librarian,
                None,
                None,
            )
            .await
    }

    /// Admin: delete a user. Deleting one's own account is rejected.
    pub async fn delete_user(&self, target_id: Uuid, caller_id: Uuid) -> AppResult<()> {
        if target_id == caller_id {
            return Err(AppError::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }
        self.repository.users.delete(target_id).await
    }

    /// List users with filters and pagination
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.search(query).await
    }

    /// Get own profile
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(user_id).await
    }

    /// Update own profile; unique identity fields must not collide with
    /// another account
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        profile: UpdateProfileRequest,
    ) -> AppResult<User> {
        let has_identity_change = profile.email.is_some()
            || profile.mobile_number.is_some()
            || profile.college_user_id.is_some();

        if has_identity_change {
            let conflict = self
                .repository
                .users
                .identity_conflict_exists(
                    user_id,
                    profile.email.as_deref(),
                    profile.mobile_number.as_deref(),
                    profile.college_user_id.as_deref(),
                )
                .await?;
            if conflict {
                return Err(AppError::Conflict("Conflicting user data".to_string()));
            }
        }

        self.repository.users.update_profile(user_id, &profile).await
    }
}
