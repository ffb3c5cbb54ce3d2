//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrowings, health, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library Management System REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API root")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::resend_otp,
        auth::verify_otp,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::forgot_password,
        auth::reset_password,
        auth::me,
        auth::update_me,
        auth::change_password,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Borrowings
        borrowings::issue,
        borrowings::return_loan,
        borrowings::list_borrowings,
        borrowings::get_borrowing,
        // Users
        users::create_user,
        users::create_librarian,
        users::delete_user,
        users::list_users,
    ),
    components(
        schemas(
            // Auth
            auth::AuthResponse,
            auth::RefreshResponse,
            auth::ProfileResponse,
            crate::models::user::RegisterRequest,
            crate::models::user::ResendOtpRequest,
            crate::models::user::VerifyOtpRequest,
            crate::models::user::LoginRequest,
            crate::models::user::ForgotPasswordRequest,
            crate::models::user::ResetPasswordRequest,
            crate::models::user::ChangePasswordRequest,
            crate::models::user::UpdateProfileRequest,
            crate::models::user::UserInfo,
            crate::models::user::Role,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookResponse,
            // Borrowings
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::BorrowingStatus,
            crate::models::borrowing::BorrowerSummary,
            crate::models::borrowing::IssueRequest,
            borrowings::BorrowingResponse,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUserRequest,
            crate::models::user::CreateLibrarianRequest,
            users::UserCreatedResponse,
            // Shared
            crate::api::PageMeta,
            crate::api::MessageResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication and session endpoints"),
        (name = "books", description = "Book catalog management"),
        (name = "borrowings", description = "Borrowing ledger"),
        (name = "users", description = "User administration")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
