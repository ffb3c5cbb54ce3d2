//! User administration endpoints

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
    models::user::{Capability, CreateLibrarianRequest, CreateUserRequest, User, UserQuery},
};

use super::{AuthenticatedUser, MessageResponse, PageMeta, Paginated, ValidatedJson};

/// Creation acknowledgement with the new account's id
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// Admin: create a user with an explicit role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserCreatedResponse),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Email or college ID already in use")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserCreatedResponse>)> {
    claims.require(Capability::ManageUsers)?;

    let user = state.services.users.create_user(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserCreatedResponse {
            message: "User created".to_string(),
            user_id: user.id,
        }),
    ))
}

/// Admin: create a librarian account
#[utoipa::path(
    post,
    path = "/users/librarian",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateLibrarianRequest,
    responses(
        (status = 201, description = "Librarian created", body = UserCreatedResponse),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_librarian(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateLibrarianRequest>,
) -> AppResult<(StatusCode, Json<UserCreatedResponse>)> {
    claims.require(Capability::ManageUsers)?;

    let user = state.services.users.create_librarian(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserCreatedResponse {
            message: "Librarian created".to_string(),
            user_id: user.id,
        }),
    ))
}

/// Admin: delete a user (self-delete is rejected)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User removed", body = MessageResponse),
        (status = 400, description = "Attempted self-delete"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    claims.require(Capability::ManageUsers)?;

    state.services.users.delete_user(id, claims.user_id).await?;
    Ok(Json(MessageResponse::new("User removed")))
}

/// List users (admins and librarians)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list"),
        (status = 403, description = "Not a librarian or admin")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<UserQuery>,
) -> AppResult<Paginated<User>> {
    claims.require(Capability::ListUsers)?;

    let (items, total) = state.services.users.list(&query).await?;
    let meta = PageMeta::new(total, query.page, query.limit);
    Ok(Paginated::new(items, meta, uri))
}
