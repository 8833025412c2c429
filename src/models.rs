use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Persisted Entities ---

/// User
///
/// Row of the `users` table. The password hash is read from storage but never
/// serialized into a response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    // FK to roles.id; 1 = user, 2 = admin.
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role
///
/// Static reference data seeded by the initial migration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// Language
///
/// Static reference data; every film points at one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Language {
    pub id: i64,
    pub name: String,
}

/// Film
///
/// Row of the `films` table. Written by admins only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Film {
    pub id: i64,
    pub title: String,
    pub release_year: i32,
    pub length: i32,
    pub description: String,
    pub rating: String,
    pub special_features: String,
    pub image: String,
    pub language_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Critic
///
/// A user's review of a film. At most one per (user_id, film_id).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Critic {
    pub id: i64,
    pub user_id: i64,
    pub film_id: i64,
    pub score: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Actor
///
/// Linked to films through `actor_film`; an attached actor blocks film deletion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Actor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AccessToken
///
/// Row of `personal_access_tokens`. `token` holds the SHA-256 hex digest of the
/// secret part of the bearer token, never the secret itself.
#[derive(Debug, Clone, FromRow, Default)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (raw, pre-validation) ---
//
// Every field is optional so that a missing field surfaces as a validation
// error on that field instead of a body-level parse failure.

/// Body of `POST /signup`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct RegisterInput {
    pub login: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
}

/// Body of `POST /signin`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginInput {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Body of `PUT|PATCH /users/{id}/password`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct PasswordInput {
    pub new_password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// Body of `POST /films` and `PUT /films/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct FilmInput {
    pub title: Option<String>,
    pub release_year: Option<i64>,
    pub length: Option<i64>,
    pub description: Option<String>,
    pub rating: Option<String>,
    pub special_features: Option<String>,
    pub image: Option<String>,
    pub language_id: Option<i64>,
}

/// Body of `POST /films/{film_id}/critics`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CriticInput {
    /// A JSON number or a numeric string such as `"7"`.
    #[serde(default, deserialize_with = "deserialize_numeric")]
    #[schema(example = 8.5)]
    pub score: Option<f64>,
    #[schema(example = "Great movie!")]
    pub comment: Option<String>,
}

/// Body of `POST /actors`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ActorInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Accepts `null`, a number, or a string that parses as a finite number.
fn deserialize_numeric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Number(f64),
        Text(String),
    }

    match Option::<Numeric>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Numeric::Number(value)) => Ok(Some(value)),
        Some(Numeric::Text(raw)) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(D::Error::custom(format!("score must be numeric, got {raw:?}"))),
        },
    }
}

// --- Validated Records (input of the repository layer) ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    // Already hashed.
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: i64,
}

/// Partial update of a user profile. The password is changed only through
/// `UserRepository::update_password`.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFilm {
    pub title: String,
    pub release_year: i32,
    pub length: i32,
    pub description: String,
    pub rating: String,
    pub special_features: String,
    pub image: String,
    pub language_id: i64,
}

/// Partial update of a film; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct FilmChanges {
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub length: Option<i32>,
    pub description: Option<String>,
    pub rating: Option<String>,
    pub special_features: Option<String>,
    pub image: Option<String>,
    pub language_id: Option<i64>,
}

impl From<NewFilm> for FilmChanges {
    fn from(film: NewFilm) -> Self {
        Self {
            title: Some(film.title),
            release_year: Some(film.release_year),
            length: Some(film.length),
            description: Some(film.description),
            rating: Some(film.rating),
            special_features: Some(film.special_features),
            image: Some(film.image),
            language_id: Some(film.language_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCritic {
    pub user_id: i64,
    pub film_id: i64,
    pub score: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Default)]
pub struct CriticChanges {
    pub score: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewActor {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActorChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLanguage {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LanguageChanges {
    pub name: Option<String>,
}

// --- Response Schemas ---

/// Returned by `POST /signin`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Pagination block attached to paginated collections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

/// `GET /films` body. `meta` is present only when `?page=` was requested.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FilmCollection {
    pub data: Vec<Film>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<PageMeta>,
}

/// `GET /films/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FilmResource {
    pub data: Film,
}

/// `GET /users/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResource {
    pub data: User,
}
