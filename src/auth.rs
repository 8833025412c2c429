use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    config::AppConfig,
    constants::{TOKEN_NAME, TOKEN_SECRET_LENGTH},
    error::AppError,
    repository::{RepoError, RepositoryState, TokenRepository},
};

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers read the caller's
/// id from it; the guard chain reads the role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Primary key of the `users` row the bearer token belongs to.
    pub id: i64,
    /// Role name looked up through `users.role_id`, e.g. "user" or "admin".
    pub role: String,
}

/// AuthUser Extractor Implementation
///
/// Bearer routes run behind the `authenticate` middleware, which stores the
/// resolved `AuthUser` in the request extensions; the extractor reads it from
/// there. Used anywhere else, it resolves the token itself.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repos = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        resolve_token(&repos, &config, token).await
    }
}

/// Extracts the credential from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// SHA-256 hex digest of a token secret; the only form persisted.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// issue_token
///
/// Creates a new token row for the user and returns the plaintext credential
/// `"{token_id}|{secret}"`. The secret is shown to the client exactly once.
pub async fn issue_token(tokens: &dyn TokenRepository, user_id: i64) -> Result<String, AppError> {
    let secret: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SECRET_LENGTH)
        .map(char::from)
        .collect();

    let row = tokens.issue(user_id, TOKEN_NAME, hash_secret(&secret)).await?;
    Ok(format!("{}|{}", row.id, secret))
}

/// resolve_token
///
/// Maps a plaintext bearer token to its owner. Malformed, unknown, revoked
/// and expired tokens, as well as tokens of deleted users, all fail with
/// `Unauthenticated`.
pub async fn resolve_token(
    repos: &RepositoryState,
    config: &AppConfig,
    token: &str,
) -> Result<AuthUser, AppError> {
    let (id, secret) = token.split_once('|').ok_or(AppError::Unauthenticated)?;
    let id: i64 = id.parse().map_err(|_| AppError::Unauthenticated)?;

    let row = repos
        .tokens
        .find(id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let digest = hash_secret(secret);
    if !bool::from(row.token.as_bytes().ct_eq(digest.as_bytes())) {
        return Err(AppError::Unauthenticated);
    }

    if let Some(ttl) = config.token_ttl_minutes {
        // A lifetime past chrono's range never elapses.
        let expires_at = Duration::try_minutes(ttl)
            .and_then(|lifetime| row.created_at.checked_add_signed(lifetime));
        if expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
            tracing::debug!(token_id = row.id, "bearer token expired");
            return Err(AppError::Unauthenticated);
        }
    }

    let user = match repos.users.get_by_id(row.user_id).await {
        Ok(user) => user,
        Err(RepoError::NotFound) => return Err(AppError::Unauthenticated),
        Err(err) => return Err(err.into()),
    };
    let role = repos.users.role_name(user.role_id).await?.unwrap_or_default();

    Ok(AuthUser { id: user.id, role })
}

/// Hashes a password with bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

/// Checks a password against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
        .map_err(AppError::from)
}
