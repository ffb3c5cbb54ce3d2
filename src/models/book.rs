//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Catalog entry from database.
///
/// `available_copies` is derived inventory: it always satisfies
/// `0 <= available_copies <= copies`. Every mutation path re-establishes
/// the bound; a CHECK constraint backs it at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub copies: i32,
    pub available_copies: i32,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation joined into borrowing records
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub copies: i32,
    pub available_copies: i32,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "copies must be non-negative"))]
    pub copies: Option<i32>,
    pub tags: Option<Vec<String>>,
}

/// Update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "copies must be non-negative"))]
    pub copies: Option<i32>,
    pub tags: Option<Vec<String>>,
}

/// Book list query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Matches title, author or ISBN
    pub q: Option<String>,
    /// Comma-separated list; matches books carrying any of the tags
    pub tags: Option<String>,
    pub sort: Option<String>,
}

impl BookQuery {
    /// Split the comma-separated tags parameter
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_splits_and_trims() {
        let query = BookQuery {
            page: None,
            limit: None,
            q: None,
            tags: Some(" rust, systems ,,web ".to_string()),
            sort: None,
        };
        assert_eq!(query.tag_list(), vec!["rust", "systems", "web"]);
    }

    #[test]
    fn tag_list_empty_when_absent() {
        let query = BookQuery {
            page: None,
            limit: None,
            q: None,
            tags: None,
            sort: None,
        };
        assert!(query.tag_list().is_empty());
    }
}
