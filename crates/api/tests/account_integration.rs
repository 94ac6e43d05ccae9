//! Integration tests for account flows: registration, login, OTP
//! verification and password reset.

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{
    authed_request, failing_email_config, get_request, json_request, parse_response_body,
    test_config, TestApp, PASSWORD,
};
use domain::services::{StaticSensorSource, UserStore};
use lifeguard_api::config::{EmailConfig, OtpConfig};
use lifeguard_api::services::{EmailService, OtpService};
use shared::crypto::sha256_hex;
use shared::otp::{decode_secret, encode_secret, SECRET_LEN};
use shared::secret_box::SecretBox;

fn register_body(email: &str) -> serde_json::Value {
    json!({"name": "Jane Doe", "email": email, "password": PASSWORD})
}

async fn current_otp(app: &TestApp, email: &str) -> String {
    let user = app.users.find_by_email(email).await.unwrap().unwrap();
    let otp = OtpService::new(&OtpConfig::default(), EmailService::new(EmailConfig::default()));
    otp.current_code(user.otp_secret.as_deref().unwrap()).unwrap()
}

// ============================================================================
// Root
// ============================================================================

#[tokio::test]
async fn test_root_welcome_with_security_headers() {
    let app = TestApp::new();

    let response = app.send(get_request("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("x-request-id").is_some());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Welcome to LifeGuard");
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_success() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            register_body("jane@example.com"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert!(body["userId"].as_str().is_some());
    assert!(body["message"].as_str().unwrap().contains("check your email"));

    let user = app
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.email_verified);
    assert!(user.otp_secret.is_some());
    assert_eq!(user.role, "User");
}

#[tokio::test]
async fn test_register_duplicate_email_creates_no_record() {
    let app = TestApp::new();

    let first = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            register_body("jane@example.com"),
        ))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            register_body("Jane@Example.com"),
        ))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.users.user_count().await, 1);
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            json!({"name": "Jane", "email": "jane@example.com", "password": "short"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.users.user_count().await, 0);
}

#[tokio::test]
async fn test_register_invalid_email() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            json!({"name": "Jane", "email": "not-an-email", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");
    assert_eq!(body["details"][0]["message"], "Invalid email format");
}

#[tokio::test]
async fn test_register_malformed_json_uses_error_body() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/Account/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{\"name\": \"Jane\""))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "bad_request");
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_succeeds_when_otp_email_fails() {
    let app = TestApp::with(failing_email_config(), StaticSensorSource::new());

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            register_body("jane@example.com"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("could not be sent"));
    assert_eq!(app.users.user_count().await, 1);

    let resend = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResendOTP",
            json!({"email": "jane@example.com"}),
        ))
        .await;
    assert_eq!(resend.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = parse_response_body(resend).await;
    assert_eq!(body["message"], "Failed to send OTP email.");
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/login",
            json!({"email": "JANE@example.com", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["email"], "jane@example.com");
    assert_eq!(body["userName"], "Jane Doe");
    assert_eq!(body["expiresIn"], 3600);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert!(body["id"].as_str().is_some());
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let wrong_password = app
        .send(json_request(
            Method::POST,
            "/api/Account/login",
            json!({"email": "jane@example.com", "password": "Guardian43"}),
        ))
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let unknown = app
        .send(json_request(
            Method::POST,
            "/api/Account/login",
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        ))
        .await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let body = parse_response_body(unknown).await;
    assert_eq!(body["message"], "Invalid credentials");
}

// ============================================================================
// OTP Tests
// ============================================================================

#[tokio::test]
async fn test_verify_otp_marks_email_verified() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let code = current_otp(&app, "jane@example.com").await;
    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/VerifyOTP",
            json!({"email": "jane@example.com", "otp": code}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "OTP verification successful.");

    let user = app
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.email_verified);
}

#[tokio::test]
async fn test_otp_secret_sealed_at_rest_when_key_configured() {
    let key = encode_secret(&[42u8; 32]);
    let mut config = test_config();
    config.otp.secret_key = key.clone();
    let app = TestApp::with(config, StaticSensorSource::new());

    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let user = app
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    let stored = user.otp_secret.unwrap();
    assert_ne!(decode_secret(&stored).unwrap().len(), SECRET_LEN);

    let otp = OtpService::new(&OtpConfig::default(), EmailService::new(EmailConfig::default()))
        .with_sealer(SecretBox::from_base64_key(&key).unwrap());
    let code = otp.current_code(&stored).unwrap();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/VerifyOTP",
            json!({"email": "jane@example.com", "otp": code}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verify_otp_rejects_wrong_code() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let code = current_otp(&app, "jane@example.com").await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/VerifyOTP",
            json!({"email": "jane@example.com", "otp": wrong}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "Invalid or expired OTP.");
}

#[tokio::test]
async fn test_otp_unknown_user() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/VerifyOTP",
            json!({"email": "nobody@example.com", "otp": "123456"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResendOTP",
            json!({"email": "nobody@example.com"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "User not found.");
}

#[tokio::test]
async fn test_resend_otp_success() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResendOTP",
            json!({"email": "jane@example.com"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "OTP has been resent successfully.");
}

// ============================================================================
// Password Reset Tests
// ============================================================================

#[tokio::test]
async fn test_forgot_password_requires_verified_email() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/forgot-password",
            json!({"email": "jane@example.com"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "User not found or email not confirmed.");

    let user = app
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    app.users.mark_email_verified(user.id).await.unwrap();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/forgot-password",
            json!({"email": "jane@example.com"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "Password reset email sent");
}

#[tokio::test]
async fn test_reset_token_works_exactly_once() {
    let app = TestApp::new();
    app.send(json_request(
        Method::POST,
        "/api/Account/register",
        register_body("jane@example.com"),
    ))
    .await;

    let user = app
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    app.users
        .create_reset_token(
            user.id,
            &sha256_hex("known-reset-token"),
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

    let reset_body = json!({
        "email": "jane@example.com",
        "token": "known-reset-token",
        "newPassword": "Lifeguard77",
        "confirmPassword": "Lifeguard77"
    });

    let first = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResetPassword",
            reset_body.clone(),
        ))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let body = parse_response_body(first).await;
    assert_eq!(body["message"], "Password Reset Successfully");

    let second = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResetPassword",
            reset_body,
        ))
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    let login = app
        .send(json_request(
            Method::POST,
            "/api/Account/login",
            json!({"email": "jane@example.com", "password": "Lifeguard77"}),
        ))
        .await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_mismatch_and_unknown_user() {
    let app = TestApp::new();

    let mismatch = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResetPassword",
            json!({
                "email": "jane@example.com",
                "token": "t",
                "newPassword": "Lifeguard77",
                "confirmPassword": "Lifeguard78"
            }),
        ))
        .await;
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .send(json_request(
            Method::POST,
            "/api/Account/ResetPassword",
            json!({
                "email": "nobody@example.com",
                "token": "t",
                "newPassword": "Lifeguard77",
                "confirmPassword": "Lifeguard77"
            }),
        ))
        .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(unknown).await;
    assert_eq!(body["message"], "User does not exist");
}

// ============================================================================
// User Lookup and Profile Tests
// ============================================================================

#[tokio::test]
async fn test_get_user_by_id() {
    let app = TestApp::new();
    let response = app
        .send(json_request(
            Method::POST,
            "/api/Account/register",
            register_body("jane@example.com"),
        ))
        .await;
    let user_id = parse_response_body(response).await["userId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .send(get_request(&format!("/api/Account/id?id={}", user_id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["userName"], "Jane Doe");
    assert_eq!(body["email"], "jane@example.com");

    let response = app
        .send(get_request(&format!(
            "/api/Account/id?id={}",
            uuid::Uuid::new_v4()
        )))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_requires_token() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/Profile")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(authed_request(Method::GET, "/api/Profile", "not-a-jwt", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let app = TestApp::new();
    let token = app.register_and_login("jane@example.com").await;

    let response = app
        .send(authed_request(Method::GET, "/api/Profile", &token, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["age"].is_null());

    let response = app
        .send(authed_request(
            Method::PUT,
            "/api/Profile",
            &token,
            Some(json!({"age": 34, "height": 172.5, "bio": "Night-shift nurse"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body = parse_response_body(response).await;
    assert_eq!(body["age"], 34);
    assert_eq!(body["height"], 172.5);
    assert_eq!(body["bio"], "Night-shift nurse");
    assert!(body["gender"].is_null());

    let response = app
        .send(authed_request(
            Method::PUT,
            "/api/Profile",
            &token,
            Some(json!({"age": 400})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
