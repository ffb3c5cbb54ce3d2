//! Borrowing (loan) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::book::BookSummary;
use super::user::Role;

/// Borrowing record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Borrowing {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Loan status, derived from dates and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    Active,
    Overdue,
    Returned,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Active => "active",
            BorrowingStatus::Overdue => "overdue",
            BorrowingStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for BorrowingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive loan status at a given instant.
///
/// returned if the loan carries a return timestamp, overdue if the due
/// date has passed, active otherwise.
pub fn status_at(
    returned_at: Option<DateTime<Utc>>,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BorrowingStatus {
    if returned_at.is_some() {
        BorrowingStatus::Returned
    } else if due_date < now {
        BorrowingStatus::Overdue
    } else {
        BorrowingStatus::Active
    }
}

impl Borrowing {
    pub fn status_at(&self, now: DateTime<Utc>) -> BorrowingStatus {
        status_at(self.returned_at, self.due_date, now)
    }

    /// Active = not yet returned
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Short borrower representation joined into borrowing records
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerSummary {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub role: Role,
}

/// Borrowing with joined book and borrower details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingDetails {
    pub id: Uuid,
    pub book: BookSummary,
    pub user: BorrowerSummary,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,
}

/// Issue request: librarian lends a book to a user
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub book_id: Uuid,
    pub user_id: Uuid,
}

/// Borrowing list query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Matches book title or borrower name/email (privileged callers only)
    pub q: Option<String>,
    pub status: Option<BorrowingStatus>,
    pub user_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub sort: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn returned_wins_over_due_date() {
        let now = Utc::now();
        // even a long-overdue loan reports returned once stamped
        let status = status_at(Some(now - Duration::days(1)), now - Duration::days(30), now);
        assert_eq!(status, BorrowingStatus::Returned);
    }

    #[test]
    fn past_due_date_is_overdue() {
        let now = Utc::now();
        let status = status_at(None, now - Duration::seconds(1), now);
        assert_eq!(status, BorrowingStatus::Overdue);
    }

    #[test]
    fn future_due_date_is_active() {
        let now = Utc::now();
        let status = status_at(None, now + Duration::days(14), now);
        assert_eq!(status, BorrowingStatus::Active);
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let now = Utc::now();
        assert_eq!(status_at(None, now, now), BorrowingStatus::Active);
    }

    #[test]
    fn status_is_stable_for_fixed_inputs() {
        let now = Utc::now();
        let due = now + Duration::days(3);
        assert_eq!(status_at(None, due, now), status_at(None, due, now));
    }

    #[test]
    fn record_level_status_and_activity() {
        let now = Utc::now();
        let mut borrowing = Borrowing {
            id: uuid::Uuid::new_v4(),
            book_id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            borrowed_at: now - Duration::days(20),
            due_date: now - Duration::days(6),
            returned_at: None,
            created_at: now - Duration::days(20),
            updated_at: now - Duration::days(20),
        };
        assert!(borrowing.is_active());
        assert_eq!(borrowing.status_at(now), BorrowingStatus::Overdue);

        borrowing.returned_at = Some(now);
        assert!(!borrowing.is_active());
        assert_eq!(borrowing.status_at(now), BorrowingStatus::Returned);
    }
}
