//! Business logic services

pub mod auth;
pub mod borrowings;
pub mod catalog;
pub mod email;
pub mod users;

use crate::{
    config::{AuthConfig, BorrowConfig, EmailConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub borrowings: borrowings::BorrowingsService,
    pub users: users::UsersService,
    pub email: email::EmailService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        borrow_config: BorrowConfig,
        email_config: EmailConfig,
    ) -> Self {
        let email = email::EmailService::new(email_config);
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config, email.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            borrowings: borrowings::BorrowingsService::new(repository.clone(), borrow_config),
            users: users::UsersService::new(repository.clone()),
            email,
            repository,
        }
    }
}
