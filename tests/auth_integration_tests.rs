mod common;

use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use common::{PASSWORD, registration, relaxed_config, test_app, test_app_with};
use films_api::{
    AppConfig,
    auth::{self, AuthUser},
    constants::ROLE_USER,
    error::AppError,
    repository::PageRequest,
};
use serde_json::json;

// --- Registration ---

#[tokio::test]
async fn test_signup_then_signin_returns_token() {
    let app = test_app();

    let (status, body) = app
        .request("POST", "/api/signup", None, Some(registration("jdoe")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "message": "Created" }));

    let (status, body) = app.sign_in("jdoe", PASSWORD).await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap();
    assert!(!token.is_empty());
    assert!(token.contains('|'), "token should be '<id>|<secret>', got {token}");
}

#[tokio::test]
async fn test_signup_assigns_user_role_and_hashes_password() {
    let app = test_app();
    app.request("POST", "/api/signup", None, Some(registration("jdoe")))
        .await;

    let user = app
        .state
        .repos
        .users
        .find_by_login("jdoe")
        .await
        .unwrap()
        .expect("registered user should be stored");
    assert_eq!(
        app.state.repos.users.role_name(user.role_id).await.unwrap().as_deref(),
        Some(ROLE_USER)
    );
    assert_ne!(user.password, PASSWORD);
    assert!(bcrypt::verify(PASSWORD, &user.password).unwrap());
}

#[tokio::test]
async fn test_signup_duplicate_login_is_rejected_once() {
    let app = test_app();

    let (first, _) = app
        .request("POST", "/api/signup", None, Some(registration("jdoe")))
        .await;
    assert_eq!(first, StatusCode::CREATED);

    let mut duplicate = registration("jdoe");
    duplicate["email"] = json!("other@example.com");
    let (second, body) = app
        .request("POST", "/api/signup", None, Some(duplicate))
        .await;
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid data" }));

    let users = app.state.repos.users.get_all(PageRequest::all()).await.unwrap();
    assert_eq!(users.total, 1);
}

#[tokio::test]
async fn test_signup_duplicate_email_is_rejected() {
    let app = test_app();
    app.request("POST", "/api/signup", None, Some(registration("jdoe")))
        .await;

    let mut duplicate = registration("other");
    duplicate["email"] = json!("jdoe@example.com");
    let (status, _) = app
        .request("POST", "/api/signup", None, Some(duplicate))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_invalid_payloads_return_400() {
    let app = test_app();

    let mut missing_field = registration("jdoe");
    missing_field.as_object_mut().unwrap().remove("first_name");
    let mut bad_email = registration("jdoe");
    bad_email["email"] = json!("not-an-email");
    let mut long_login = registration("jdoe");
    long_login["login"] = json!("x".repeat(51));

    for payload in [missing_field, bad_email, long_login] {
        let (status, body) = app.request("POST", "/api/signup", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid data");
    }
}

#[tokio::test]
async fn test_signup_malformed_json_returns_400() {
    let app = test_app();
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::builder()
            .method("POST")
            .uri("/api/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Sign-in ---

#[tokio::test]
async fn test_signin_unknown_login_returns_401_without_token() {
    let app = test_app();

    let (status, body) = app.sign_in("ghost", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Failed to log in" }));
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_signin_wrong_password_returns_401() {
    let app = test_app();
    app.seed_user("jdoe", 1).await;

    let (status, body) = app.sign_in("jdoe", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Failed to log in");
}

#[tokio::test]
async fn test_signin_missing_password_returns_400() {
    let app = test_app();
    let (status, body) = app
        .request("POST", "/api/signin", None, Some(json!({ "login": "jdoe" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid data");
}

#[tokio::test]
async fn test_padded_password_only_signs_in_verbatim() {
    let app = test_app();
    let mut payload = registration("spacey");
    payload["password"] = json!("  secret  ");
    let (status, _) = app.request("POST", "/api/signup", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.sign_in("spacey", "secret").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.sign_in("spacey", "  secret  ").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_whitespace_password_is_a_password() {
    let app = test_app();
    let mut payload = registration("blank");
    payload["password"] = json!("   ");
    let (status, _) = app.request("POST", "/api/signup", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.sign_in("blank", "   ").await;
    assert_eq!(status, StatusCode::CREATED);

    let mut empty = registration("empty");
    empty["password"] = json!("");
    let (status, _) = app.request("POST", "/api/signup", None, Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// --- Sign-out ---

#[tokio::test]
async fn test_signout_without_token_returns_401() {
    let app = test_app();
    let (status, body) = app.request("GET", "/api/signout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Unauthenticated." }));
}

#[tokio::test]
async fn test_signout_revokes_every_token_of_the_user() {
    let app = test_app();
    let (user, first) = app.user("jdoe").await;
    let (_, second) = app.sign_in("jdoe", PASSWORD).await;
    let second = second["token"].as_str().unwrap().to_string();

    let (status, _) = app.request("GET", "/api/signout", Some(&first), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for token in [&first, &second] {
        let uri = format!("/api/users/{}", user.id);
        let (status, body) = app.request("GET", &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthenticated.");
    }

    let (status, _) = app.request("GET", "/api/signout", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// --- Token handling ---

#[tokio::test]
async fn test_malformed_and_forged_tokens_are_rejected() {
    let app = test_app();
    let (user, token) = app.user("jdoe").await;
    let (id, _) = token.split_once('|').unwrap();
    let forged = format!("{id}|{}", "a".repeat(40));
    let uri = format!("/api/users/{}", user.id);

    for bad in ["garbage", "abc|def", forged.as_str(), ""] {
        let (status, _) = app.request("GET", &uri, Some(bad), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {bad:?} should be refused");
    }

    let (status, _) = app.request("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_only_the_secret_digest_is_stored() {
    let app = test_app();
    let (_, token) = app.user("jdoe").await;
    let (id, secret) = token.split_once('|').unwrap();

    let row = app
        .state
        .repos
        .tokens
        .find(id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(row.token, secret);
    assert_eq!(row.token, auth::hash_secret(secret));
    assert_eq!(row.token.len(), 64);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = test_app_with(AppConfig {
        token_ttl_minutes: Some(0),
        ..relaxed_config()
    });
    let (user, token) = app.user("jdoe").await;

    let uri = format!("/api/users/{}", user.id);
    let (status, _) = app.request("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_within_ttl_is_accepted() {
    let app = test_app_with(AppConfig {
        token_ttl_minutes: Some(60),
        ..relaxed_config()
    });
    let (user, token) = app.user("jdoe").await;

    let uri = format!("/api/users/{}", user.id);
    let (status, _) = app.request("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (id, _) = token.split_once('|').unwrap();
    let row = app
        .state
        .repos
        .tokens
        .find(id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(row.created_at > Utc::now() - Duration::minutes(1));
}

#[tokio::test]
async fn test_ttl_beyond_duration_range_never_expires() {
    let app = test_app_with(AppConfig {
        token_ttl_minutes: Some(i64::MAX / 2),
        ..relaxed_config()
    });
    let (user, token) = app.user("jdoe").await;

    let uri = format!("/api/users/{}", user.id);
    let (status, body) = app.request("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user.id);
}

#[tokio::test]
async fn test_token_of_deleted_user_is_rejected() {
    let app = test_app();
    let (user, token) = app.user("jdoe").await;

    app.state.repos.users.delete(user.id).await.unwrap();

    let result = auth::resolve_token(&app.state.repos, &app.state.config, &token).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

// --- AuthUser extractor ---

#[tokio::test]
async fn test_auth_user_extractor_resolves_bearer_token() {
    let app = test_app();
    let (user, token) = app.user("jdoe").await;

    let request = Request::builder()
        .uri("/")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let resolved = AuthUser::from_request_parts(&mut parts, &app.state)
        .await
        .unwrap();
    assert_eq!(
        resolved,
        AuthUser {
            id: user.id,
            role: ROLE_USER.to_string(),
        }
    );
}

#[tokio::test]
async fn test_auth_user_extractor_prefers_request_extensions() {
    let app = test_app();
    let stored = AuthUser {
        id: 42,
        role: "admin".to_string(),
    };

    let request = Request::builder().uri("/").body(()).unwrap();
    let (mut parts, _) = request.into_parts();
    parts.extensions.insert(stored.clone());

    let resolved = AuthUser::from_request_parts(&mut parts, &app.state)
        .await
        .unwrap();
    assert_eq!(resolved, stored);
}

#[tokio::test]
async fn test_auth_user_extractor_without_header_is_unauthenticated() {
    let app = test_app();
    let request = Request::builder().uri("/").body(()).unwrap();
    let (mut parts, _) = request.into_parts();

    let result = AuthUser::from_request_parts(&mut parts, &app.state).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

// --- Password hashing ---

#[tokio::test]
async fn test_hash_and_verify_password_round_trip() {
    let hash = auth::hash_password("hunter2".to_string(), 4).await.unwrap();
    assert!(auth::verify_password("hunter2".to_string(), hash.clone()).await.unwrap());
    assert!(!auth::verify_password("hunter3".to_string(), hash).await.unwrap());
}
