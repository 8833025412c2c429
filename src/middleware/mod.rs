//! Request pipeline stages that run before a handler:
//! throttle, then `authenticate`, then the guard chain.

pub mod guard;
pub mod throttle;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    auth::{bearer_token, resolve_token},
    error::AppError,
};

pub use guard::{Guard, GuardChain, run_guards};
pub use throttle::{RateLimits, Throttle, throttle};

/// authenticate
///
/// Enforces a valid bearer token on every route it is layered on. The resolved
/// `AuthUser` is stored in the request extensions for guards and handlers.
/// Rejects with 401 `{"message": "Unauthenticated."}`.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or(AppError::Unauthenticated)?;

    let user = resolve_token(&state.repos, &state.config, &token).await?;
    tracing::debug!(user_id = user.id, role = %user.role, "request authenticated");

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
