//! Borrowing (loan) endpoints

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::borrowing::{BorrowingDetails, BorrowingQuery, IssueRequest},
    models::user::Capability,
};

use super::{AuthenticatedUser, PageMeta, Paginated, ValidatedJson};

/// Single-borrowing envelope
#[derive(Serialize, ToSchema)]
pub struct BorrowingResponse {
    pub borrowing: BorrowingDetails,
}

/// Issue a book to a user
#[utoipa::path(
    post,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Book issued", body = BorrowingResponse),
        (status = 403, description = "Not a librarian or admin"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copies available or duplicate active loan")
    )
)]
pub async fn issue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<IssueRequest>,
) -> AppResult<(StatusCode, Json<BorrowingResponse>)> {
    claims.require(Capability::ManageLoans)?;

    let borrowing = state
        .services
        .borrowings
        .issue(request.book_id, request.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(BorrowingResponse { borrowing })))
}

/// Mark a borrowed book as returned
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowingResponse),
        (status = 404, description = "Borrowing not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowingResponse>> {
    claims.require(Capability::ManageLoans)?;

    let borrowing = state.services.borrowings.return_loan(id).await?;
    Ok(Json(BorrowingResponse { borrowing }))
}

/// List borrowings. Students see only their own loans; librarians and
/// admins may filter freely.
#[utoipa::path(
    get,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "Paginated borrowing list"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrowings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<BorrowingQuery>,
) -> AppResult<Paginated<BorrowingDetails>> {
    let (items, total) = state.services.borrowings.list(&claims, &query).await?;
    let meta = PageMeta::new(total, query.page, query.limit);
    Ok(Paginated::new(items, meta, uri))
}

/// Get one borrowing (borrower or privileged roles)
#[utoipa::path(
    get,
    path = "/borrowings/{id}",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Borrowing details", body = BorrowingResponse),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn get_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowingResponse>> {
    let borrowing = state.services.borrowings.get(id, &claims).await?;
    Ok(Json(BorrowingResponse { borrowing }))
}
