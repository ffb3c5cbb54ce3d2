//! API integration tests
//!
//! These run against a live server with a migrated database and a
//! seeded admin account. Run with: cargo test -- --ignored
//!
//! Environment: LIBRIS_TEST_BASE_URL (default http://localhost:5000),
//! ADMIN_EMAIL / ADMIN_PASSWORD (default admin@library.local /
//! Password123!).

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("LIBRIS_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

fn api(path: &str) -> String {
    format!("{}/api{}", base_url(), path)
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

/// First value of a named Set-Cookie in the response
fn extract_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.to_string())
        })
}

async fn login(client: &Client, email: &str, password: &str) -> (String, String) {
    let response = client
        .post(api("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK, "login failed for {email}");
    let cookie = extract_cookie(&response, "refreshToken").expect("No refresh cookie set");

    let body: Value = response.json().await.expect("Failed to parse login response");
    let token = body["accessToken"]
        .as_str()
        .expect("No access token in response")
        .to_string();
    (token, cookie)
}

async fn admin_token(client: &Client) -> String {
    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Password123!".to_string());
    login(client, &email, &password).await.0
}

/// Create a student account through the admin endpoint and return
/// (user_id, email)
async fn create_student(client: &Client, token: &str) -> (String, String) {
    let email = unique_email("student");
    let response = client
        .post(api("/users"))
        .bearer_auth(token)
        .json(&json!({
            "fullname": "Test Student",
            "email": email,
            "password": "Password123!",
            "role": "student"
        }))
        .send()
        .await
        .expect("Failed to create student");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    (body["userId"].as_str().unwrap().to_string(), email)
}

async fn create_book(client: &Client, token: &str, title: &str, copies: i64) -> String {
    let response = client
        .post(api("/books"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "copies": copies }))
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["book"]["id"].as_str().unwrap().to_string()
}

async fn available_copies(client: &Client, token: &str, book_id: &str) -> i64 {
    let response = client
        .get(api(&format!("/books/{}", book_id)))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to get book");
    let body: Value = response.json().await.unwrap();
    body["book"]["availableCopies"].as_i64().unwrap()
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(api("/auth/login"))
        .json(&json!({
            "email": "admin@library.local",
            "password": "definitely-wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_unauthenticated_request_rejected() {
    let client = Client::new();

    let response = client
        .get(api("/books"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A garbage bearer token reads as expired/invalid
    let response = client
        .get(api("/books"))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_validation_failure_shape() {
    let client = Client::new();

    let response = client
        .post(api("/auth/login"))
        .json(&json!({ "email": "not-an-email", "password": "" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body["details"].is_array());
    assert!(body["details"][0]["path"].is_string());
    assert!(body["details"][0]["message"].is_string());
}

/// Scenario: OTP attempts exhaust after max wrong submissions; resend
/// resets the path with a fresh code.
#[tokio::test]
#[ignore]
async fn test_registration_otp_attempt_ceiling() {
    let client = Client::new();
    let email = unique_email("otp");

    let response = client
        .post(api("/auth/register"))
        .json(&json!({
            "fullname": "Otp Tester",
            "password": "Password123!",
            "email": email,
            "collegeUserId": format!("CID-{}", uuid::Uuid::new_v4().simple())
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status(), StatusCode::OK);

    // Five wrong codes burn the attempt budget
    for _ in 0..5 {
        let response = client
            .post(api("/auth/register/verify"))
            .json(&json!({ "email": email, "code": "000000" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Invalid code");
    }

    // Sixth attempt fails as exhausted, not as a code mismatch
    let response = client
        .post(api("/auth/register/verify"))
        .json(&json!({ "email": email, "code": "000000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Code expired or max attempts reached");

    // Resend issues a fresh code with a clean attempt budget
    let response = client
        .post(api("/auth/register/resend"))
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A wrong code now reads as a mismatch again, not as exhausted
    let response = client
        .post(api("/auth/register/verify"))
        .json(&json!({ "email": email, "code": "000000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid code");
}

/// Scenario: copy accounting through an issue/return cycle.
#[tokio::test]
#[ignore]
async fn test_issue_and_return_copy_accounting() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let (user_id, _) = create_student(&client, &token).await;
    let book_id = create_book(&client, &token, "Single Copy Book", 1).await;
    assert_eq!(available_copies(&client, &token, &book_id).await, 1);

    // Issue the only copy
    let response = client
        .post(api("/borrowings"))
        .bearer_auth(&token)
        .json(&json!({ "bookId": book_id, "userId": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let borrowing_id = body["borrowing"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["borrowing"]["status"], "active");
    assert_eq!(available_copies(&client, &token, &book_id).await, 0);

    // Same pair again: duplicate active loan
    let response = client
        .post(api("/borrowings"))
        .bearer_auth(&token)
        .json(&json!({ "bookId": book_id, "userId": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Another user: no copies left
    let (other_user, _) = create_student(&client, &token).await;
    let response = client
        .post(api("/borrowings"))
        .bearer_auth(&token)
        .json(&json!({ "bookId": book_id, "userId": other_user }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No copies available to borrow");
    assert_eq!(available_copies(&client, &token, &book_id).await, 0);

    // Return puts the copy back and derives status
    let response = client
        .post(api(&format!("/borrowings/{}/return", borrowing_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["borrowing"]["status"], "returned");
    assert_eq!(available_copies(&client, &token, &book_id).await, 1);

    // A second return must not increment again
    let response = client
        .post(api(&format!("/borrowings/{}/return", borrowing_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(available_copies(&client, &token, &book_id).await, 1);
}

/// Scenario: refresh rotation hands out a usable access token and the
/// rotated-out cookie is dead on arrival.
#[tokio::test]
#[ignore]
async fn test_refresh_rotation_and_replay_rejection() {
    let client = Client::new();
    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Password123!".to_string());
    let (_, old_cookie) = login(&client, &email, &password).await;

    // Exchange the cookie for a fresh access token
    let response = client
        .post(api("/auth/refresh"))
        .header(
            reqwest::header::COOKIE,
            format!("refreshToken={}", old_cookie),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_cookie = extract_cookie(&response, "refreshToken").expect("Cookie not rotated");
    assert_ne!(new_cookie, old_cookie);

    let body: Value = response.json().await.unwrap();
    let access = body["accessToken"].as_str().unwrap();

    // The new access token works on a protected endpoint
    let response = client
        .get(api("/auth/me"))
        .bearer_auth(access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the rotated-out cookie is rejected
    let response = client
        .post(api("/auth/refresh"))
        .header(
            reqwest::header::COOKIE,
            format!("refreshToken={}", old_cookie),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_refresh_without_cookie_fails() {
    let client = Client::new();

    let response = client.post(api("/auth/refresh")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing refresh token");
}

#[tokio::test]
#[ignore]
async fn test_logout_revokes_refresh_token() {
    let client = Client::new();
    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Password123!".to_string());
    let (_, cookie) = login(&client, &email, &password).await;

    let response = client
        .post(api("/auth/logout"))
        .header(reqwest::header::COOKIE, format!("refreshToken={}", cookie))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(api("/auth/refresh"))
        .header(reqwest::header::COOKIE, format!("refreshToken={}", cookie))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Students are pinned to their own loans and locked out of mutations.
#[tokio::test]
#[ignore]
async fn test_student_role_scoping() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let (student_id, student_email) = create_student(&client, &admin).await;
    let (student_token, _) = login(&client, &student_email, "Password123!").await;

    // Issue a book to the student and one to someone else
    let book_a = create_book(&client, &admin, "Scoping Book A", 2).await;
    let book_b = create_book(&client, &admin, "Scoping Book B", 2).await;
    let (other_id, _) = create_student(&client, &admin).await;

    for (book, user) in [(&book_a, &student_id), (&book_b, &other_id)] {
        let response = client
            .post(api("/borrowings"))
            .bearer_auth(&admin)
            .json(&json!({ "bookId": book, "userId": user }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // The student's list contains only their own loans, filters or not
    let response = client
        .get(api(&format!("/borrowings?userId={}", other_id)))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    for item in body["items"].as_array().unwrap() {
        assert_eq!(item["user"]["id"].as_str().unwrap(), student_id);
    }

    // Mutations are forbidden
    let response = client
        .post(api("/books"))
        .bearer_auth(&student_token)
        .json(&json!({ "title": "Student Book" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(api("/borrowings"))
        .bearer_auth(&student_token)
        .json(&json!({ "bookId": book_a, "userId": student_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client.get(api("/users")).bearer_auth(&student_token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_list_pagination_contract() {
    let client = Client::new();
    let token = admin_token(&client).await;

    for i in 0..3 {
        create_book(&client, &token, &format!("Paging Book {}", i), 1).await;
    }

    let response = client
        .get(api("/books?page=1&limit=2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let total_count = response
        .headers()
        .get("x-total-count")
        .expect("Missing X-Total-Count header")
        .to_str()
        .unwrap()
        .parse::<i64>()
        .unwrap();
    assert!(total_count >= 3);

    let link = response
        .headers()
        .get("link")
        .expect("Missing Link header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(link.contains("rel=\"first\""));
    assert!(link.contains("rel=\"next\""));
    assert!(link.contains("rel=\"last\""));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["limit"], 2);
    assert_eq!(body["meta"]["hasNext"], true);
    assert_eq!(body["meta"]["hasPrev"], false);
    assert_eq!(body["meta"]["total"], total_count);
}

#[tokio::test]
#[ignore]
async fn test_copies_edit_clamps_available() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let book_id = create_book(&client, &token, "Clamp Book", 5).await;

    let response = client
        .put(api(&format!("/books/{}", book_id)))
        .bearer_auth(&token)
        .json(&json!({ "copies": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["book"]["copies"], 2);
    assert_eq!(body["book"]["availableCopies"], 2);
}

#[tokio::test]
#[ignore]
async fn test_forgot_password_is_uniform() {
    let client = Client::new();

    let known = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string());
    let unknown = unique_email("ghost");

    for email in [known, unknown] {
        let response = client
            .post(api("/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "If the email exists, a reset link has been sent.");
    }
}

#[tokio::test]
#[ignore]
async fn test_admin_cannot_delete_self() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let response = client
        .get(api("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let admin_id = body["user"]["id"].as_str().unwrap().to_string();

    let response = client
        .delete(api(&format!("/users/{}", admin_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
