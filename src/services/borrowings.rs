//! Borrowing ledger service

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::BorrowConfig,
    error::{AppError, AppResult},
    models::{
        borrowing::{BorrowingDetails, BorrowingQuery},
        UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    config: BorrowConfig,
}

impl BorrowingsService {
    pub fn new(repository: Repository, config: BorrowConfig) -> Self {
        Self { repository, config }
    }

    /// Issue a book to a user. The due date is fixed at issue time.
    pub async fn issue(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowingDetails> {
        // Surface a dangling user reference before touching inventory
        self.repository.users.get_by_id(user_id).await?;

        let due_date = Utc::now() + Duration::days(self.config.borrow_days);
        let borrowing = self
            .repository
            .borrowings
            .issue(book_id, user_id, due_date)
            .await?;

        self.repository.borrowings.get_details(borrowing.id).await
    }

    /// Mark a borrowed book as returned
    pub async fn return_loan(&self, id: Uuid) -> AppResult<BorrowingDetails> {
        let borrowing = self.repository.borrowings.return_loan(id).await?;
        self.repository.borrowings.get_details(borrowing.id).await
    }

    /// List borrowings. Non-privileged callers are pinned to their own
    /// loans regardless of the filters they send.
    pub async fn list(
        &self,
        claims: &UserClaims,
        query: &BorrowingQuery,
    ) -> AppResult<(Vec<BorrowingDetails>, i64)> {
        let scope_user = if claims.is_privileged() {
            None
        } else {
            Some(claims.user_id)
        };
        self.repository.borrowings.search(scope_user, query).await
    }

    /// Get one borrowing; visible to the borrower and privileged roles
    pub async fn get(&self, id: Uuid, claims: &UserClaims) -> AppResult<BorrowingDetails> {
        let details = self.repository.borrowings.get_details(id).await?;
        if !claims.is_privileged() && details.user.id != claims.user_id {
            return Err(AppError::Authorization("Forbidden".to_string()));
        }
        Ok(details)
    }
}
