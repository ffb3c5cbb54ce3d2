//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod borrowings;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{
        header::{self, HeaderName, HeaderValue, AUTHORIZATION},
        request::Parts,
        Uri,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::{error::AppError, models::user::UserClaims, repository::page_window, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("No token provided".to_string()))?;

        // Check for Bearer token
        if !auth_header.starts_with("Bearer ") {
            return Err(AppError::Authentication(
                "Invalid authorization header format".to_string(),
            ));
        }

        let token = &auth_header[7..];

        // Validate JWT token using the secret from configuration
        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// JSON extractor that runs `validator` rules and rejects with
/// `400 {error, details}` on failure
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: serde::de::DeserializeOwned + Validate + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Pagination metadata returned with every list response
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

impl PageMeta {
    /// Compute pagination metadata from the raw query values (clamped
    /// the same way the repositories clamp them)
    pub fn new(total: i64, page: Option<i64>, limit: Option<i64>) -> Self {
        let (page, limit, _) = page_window(page, limit);
        let total_pages = ((total + limit - 1) / limit).max(1);
        let has_next = page < total_pages;
        let has_prev = page > 1;
        PageMeta {
            total,
            page,
            limit,
            total_pages,
            has_next,
            has_prev,
            next_page: has_next.then_some(page + 1),
            prev_page: has_prev.then_some(page - 1),
        }
    }
}

#[derive(Serialize)]
struct PageBody<T: Serialize> {
    items: Vec<T>,
    meta: PageMeta,
}

/// Paginated list response: `{items, meta}` plus `X-Total-Count` and
/// RFC5988 `Link` headers built from the request URI
pub struct Paginated<T> {
    items: Vec<T>,
    meta: PageMeta,
    uri: Uri,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, meta: PageMeta, uri: Uri) -> Self {
        Self { items, meta, uri }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let total = self.meta.total;
        let link = build_link_header(&self.uri, &self.meta);

        let mut response = Json(PageBody {
            items: self.items,
            meta: self.meta,
        })
        .into_response();

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&total.to_string()) {
            headers.insert(HeaderName::from_static("x-total-count"), value);
        }
        if let Ok(value) = HeaderValue::from_str(&link) {
            headers.insert(header::LINK, value);
        }
        response
    }
}

/// URL for a given page, carrying the other query parameters through
fn page_url(uri: &Uri, page: i64, limit: i64) -> String {
    let mut params: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            key != "page" && key != "limit"
        })
        .map(String::from)
        .collect();
    params.push(format!("page={}", page));
    params.push(format!("limit={}", limit));
    format!("{}?{}", uri.path(), params.join("&"))
}

/// RFC5988-style Link header with first/prev/next/last relations
pub fn build_link_header(uri: &Uri, meta: &PageMeta) -> String {
    let mut links = Vec::new();
    if let Some(prev) = meta.prev_page {
        links.push(format!("<{}>; rel=\"prev\"", page_url(uri, prev, meta.limit)));
    }
    links.push(format!("<{}>; rel=\"first\"", page_url(uri, 1, meta.limit)));
    if let Some(next) = meta.next_page {
        links.push(format!("<{}>; rel=\"next\"", page_url(uri, next, meta.limit)));
    }
    links.push(format!(
        "<{}>; rel=\"last\"",
        page_url(uri, meta.total_pages, meta.limit)
    ));
    links.join(", ")
}

/// Plain `{message}` acknowledgement body
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_for_single_page() {
        let meta = PageMeta::new(5, None, None);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.limit, 20);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.prev_page, None);
    }

    #[test]
    fn meta_for_middle_page() {
        let meta = PageMeta::new(95, Some(3), Some(10));
        assert_eq!(meta.total_pages, 10);
        assert!(meta.has_next);
        assert!(meta.has_prev);
        assert_eq!(meta.next_page, Some(4));
        assert_eq!(meta.prev_page, Some(2));
    }

    #[test]
    fn meta_with_zero_total_still_reports_one_page() {
        let meta = PageMeta::new(0, Some(1), Some(20));
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next);
    }

    #[test]
    fn meta_clamps_limit_to_100() {
        let meta = PageMeta::new(1000, Some(1), Some(500));
        assert_eq!(meta.limit, 100);
        assert_eq!(meta.total_pages, 10);
    }

    #[test]
    fn link_header_carries_filters_through() {
        let uri = Uri::from_static("/api/books?q=rust&page=2&limit=10");
        let meta = PageMeta::new(95, Some(2), Some(10));
        let header = build_link_header(&uri, &meta);
        assert!(header.contains(r#"</api/books?q=rust&page=1&limit=10>; rel="prev""#));
        assert!(header.contains(r#"</api/books?q=rust&page=1&limit=10>; rel="first""#));
        assert!(header.contains(r#"</api/books?q=rust&page=3&limit=10>; rel="next""#));
        assert!(header.contains(r#"</api/books?q=rust&page=10&limit=10>; rel="last""#));
    }

    #[test]
    fn link_header_on_first_page_has_no_prev() {
        let uri = Uri::from_static("/api/books");
        let meta = PageMeta::new(50, Some(1), Some(20));
        let header = build_link_header(&uri, &meta);
        assert!(!header.contains("rel=\"prev\""));
        assert!(header.contains(r#"</api/books?page=1&limit=20>; rel="first""#));
        assert!(header.contains(r#"</api/books?page=2&limit=20>; rel="next""#));
        assert!(header.contains(r#"</api/books?page=3&limit=20>; rel="last""#));
    }
}
