//! Authentication and profile endpoints
//!
//! The refresh secret travels exclusively in an http-only cookie scoped
//! to the auth route prefix; JSON bodies only ever carry the access
//! token.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::AuthConfig,
    error::AppResult,
    models::user::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        ResendOtpRequest, ResetPasswordRequest, UpdateProfileRequest, User, UserInfo,
        VerifyOtpRequest,
    },
};

use super::{AuthenticatedUser, MessageResponse, ValidatedJson};

/// Access token and user summary returned by login and OTP verification
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserInfo,
}

/// Fresh access token returned by the refresh endpoint
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Profile envelope for /auth/me
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: User,
}

fn refresh_cookie(config: &AuthConfig, value: String) -> Cookie<'static> {
    Cookie::build((config.refresh_cookie_name.clone(), value))
        .http_only(true)
        .secure(config.refresh_cookie_secure)
        .same_site(SameSite::Lax)
        .path(config.refresh_cookie_path.clone())
        .max_age(time::Duration::days(config.refresh_token_days))
        .build()
}

fn clear_refresh_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((config.refresh_cookie_name.clone(), String::new()))
        .http_only(true)
        .path(config.refresh_cookie_path.clone())
        .max_age(time::Duration::ZERO)
        .build()
}

fn refresh_secret_from(jar: &CookieJar, config: &AuthConfig) -> Option<String> {
    jar.get(&config.refresh_cookie_name)
        .map(|cookie| cookie.value().to_string())
}

/// Start a registration: emails a one-time code
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth.request_registration(&request).await?;
    Ok(Json(MessageResponse::new("Verification code sent to email")))
}

/// Re-send the registration code for a pending registration
#[utoipa::path(
    post,
    path = "/auth/register/resend",
    tag = "auth",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "No pending registration"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn resend_otp(
    State(state): State<crate::AppState>,
    ValidatedJson(request): ValidatedJson<ResendOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .auth
        .resend_registration_otp(&request.email)
        .await?;
    Ok(Json(MessageResponse::new("Verification code sent to email")))
}

/// Verify the emailed code and create the account
#[utoipa::path(
    post,
    path = "/auth/register/verify",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn verify_otp(
    State(state): State<crate::AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<VerifyOtpRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let (tokens, user) = state
        .services
        .auth
        .verify_registration_otp(&request.email, &request.code)
        .await?;

    let jar = jar.add(refresh_cookie(&state.config.auth, tokens.refresh_token));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            access_token: tokens.access_token,
            user: UserInfo::from(&user),
        }),
    ))
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let (tokens, user) = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?;

    let jar = jar.add(refresh_cookie(&state.config.auth, tokens.refresh_token));
    Ok((
        jar,
        Json(AuthResponse {
            access_token: tokens.access_token,
            user: UserInfo::from(&user),
        }),
    ))
}

/// Exchange the refresh cookie for a new access token; rotates the
/// cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing, invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<RefreshResponse>)> {
    let secret = refresh_secret_from(&jar, &state.config.auth);
    let tokens = state.services.auth.refresh(secret.as_deref()).await?;

    let jar = jar.add(refresh_cookie(&state.config.auth, tokens.refresh_token));
    Ok((
        jar,
        Json(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

/// Revoke the session and clear the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(
    State(state): State<crate::AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let secret = refresh_secret_from(&jar, &state.config.auth);
    state.services.auth.logout(secret.as_deref()).await?;

    let jar = jar.add(clear_refresh_cookie(&state.config.auth));
    Ok((jar, Json(MessageResponse::new("Logged out"))))
}

/// Request a password reset link. The response never discloses whether
/// the address is registered.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Uniform acknowledgement", body = MessageResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<crate::AppState>,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth.forgot_password(&request.email).await?;
    Ok(Json(MessageResponse::new(
        "If the email exists, a reset link has been sent.",
    )))
}

/// Set a new password using an emailed reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<crate::AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    state
        .services
        .auth
        .reset_password(&request.token, &request.password)
        .await?;

    // Every session was revoked; drop the cookie as well
    let jar = jar.add(clear_refresh_cookie(&state.config.auth));
    Ok((jar, Json(MessageResponse::new("Password updated"))))
}

/// Get own profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let user = state.services.users.get_profile(claims.user_id).await?;
    Ok(Json(ProfileResponse { user }))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 409, description = "Conflicting user data")
    )
)]
pub async fn update_me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user = state
        .services
        .users
        .update_profile(claims.user_id, request)
        .await?;
    Ok(Json(ProfileResponse { user }))
}

/// Change own password; revokes every session
#[utoipa::path(
    put,
    path = "/auth/me/password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid current password")
    )
)]
pub async fn change_password(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    state
        .services
        .auth
        .change_password(claims.user_id, &request.old_password, &request.new_password)
        .await?;

    let jar = jar.add(clear_refresh_cookie(&state.config.auth));
    Ok((jar, Json(MessageResponse::new("Password changed"))))
}
