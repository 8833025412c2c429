//! Shared harness for the router-level integration tests.
//!
//! Every test builds its own `AppState` over a fresh `InMemoryRepository`, so
//! tests never share rows or throttle budgets.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use films_api::{
    AppConfig, AppState, InMemoryRepository, RepositoryState, auth, create_router,
    constants::{ROLE_ADMIN_ID, ROLE_USER_ID},
    models::{Film, NewFilm, NewUser, User},
    repository::PageRequest,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "secret-password";

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
}

/// Config with throttles high enough that multi-step flows never trip them.
pub fn relaxed_config() -> AppConfig {
    AppConfig {
        auth_throttle_per_minute: 1_000,
        default_throttle_per_minute: 1_000,
        ..AppConfig::default()
    }
}

pub fn test_app() -> TestApp {
    test_app_with(relaxed_config())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(RepositoryState::from_backend(repo.clone()), config);
    TestApp {
        router: create_router(state.clone()),
        repo,
        state,
    }
}

pub fn film_payload() -> Value {
    json!({
        "title": "Metropolis",
        "release_year": 1927,
        "length": 153,
        "description": "A futuristic city sharply divided between workers and planners.",
        "rating": "PG",
        "special_features": "Trailers",
        "image": "metropolis.jpg",
        "language_id": 5
    })
}

pub fn new_film(title: &str) -> NewFilm {
    NewFilm {
        title: title.to_string(),
        release_year: 1999,
        length: 136,
        description: "A hacker learns the truth.".to_string(),
        rating: "R".to_string(),
        special_features: "Commentaries".to_string(),
        image: "matrix.jpg".to_string(),
        language_id: 1,
    }
}

pub fn registration(login: &str) -> Value {
    json!({
        "login": login,
        "password": PASSWORD,
        "email": format!("{login}@example.com"),
        "last_name": "Doe",
        "first_name": "Jane"
    })
}

impl TestApp {
    /// Sends one request through the full router and returns the status and
    /// the JSON body (`Value::Null` when the body is empty or not JSON).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn sign_in(&self, login: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/api/signin",
            None,
            Some(json!({ "login": login, "password": password })),
        )
        .await
    }

    /// Inserts a user directly and returns it.
    pub async fn seed_user(&self, login: &str, role_id: i64) -> User {
        let password = auth::hash_password(PASSWORD.to_string(), 4).await.unwrap();
        self.state
            .repos
            .users
            .create(NewUser {
                login: login.to_string(),
                email: format!("{login}@example.com"),
                password,
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                role_id,
            })
            .await
            .unwrap()
    }

    /// Seeds a user and signs it in through the API.
    pub async fn login_as(&self, login: &str, role_id: i64) -> (User, String) {
        let user = self.seed_user(login, role_id).await;
        let (status, body) = self.sign_in(login, PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().unwrap().to_string();
        (user, token)
    }

    pub async fn user(&self, login: &str) -> (User, String) {
        self.login_as(login, ROLE_USER_ID).await
    }

    pub async fn admin(&self) -> (User, String) {
        self.login_as("admin", ROLE_ADMIN_ID).await
    }

    pub async fn seed_film(&self, title: &str) -> Film {
        self.state.repos.films.create(new_film(title)).await.unwrap()
    }

    pub async fn film_count(&self) -> u64 {
        self.state
            .repos
            .films
            .get_all(PageRequest::all())
            .await
            .unwrap()
            .total
    }
}
