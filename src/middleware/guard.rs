//! Authorization chain
//!
//! A route lists the guards it needs in order; `run_guards` evaluates them one
//! after another before the handler and stops at the first failure. Guards see
//! the identity stored by `authenticate`, the raw path parameters and, when they
//! need it, the JSON body.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{RawPathParams, Request, State, rejection::RawPathParamsRejection},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::PasswordInput,
    validation::ValidationErrors,
};

/// Bodies larger than this are not buffered for inspection.
const MAX_GUARDED_BODY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The caller's role name must equal the given one exactly.
    Role(&'static str),
    /// Path `id` must be the caller's own user id.
    Ownership,
    /// The caller must not have reviewed the film at path `id` yet.
    CriticLimit,
    /// The film at path `id` must have no critic or actor attached.
    /// A missing film passes so the handler can answer 404.
    FilmDeletable,
    /// `new_password` and `password_confirmation` in the body must be equal.
    PasswordConfirmation,
}

/// Ordered guards of one route plus the state they query.
#[derive(Clone)]
pub struct GuardChain {
    state: AppState,
    guards: Arc<[Guard]>,
}

impl GuardChain {
    pub fn new(state: &AppState, guards: &[Guard]) -> Self {
        Self {
            state: state.clone(),
            guards: guards.into(),
        }
    }
}

/// Path parameters captured by the router, owned so guards can await freely.
struct PathParams(Vec<(String, String)>);

impl PathParams {
    fn id(&self, name: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.parse().ok())
    }
}

pub async fn run_guards(
    State(chain): State<GuardChain>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let params = match params {
        Ok(raw) => PathParams(
            raw.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        ),
        Err(_) => PathParams(Vec::new()),
    };

    for guard in chain.guards.iter() {
        req = guard.check(&chain.state, &params, req).await?;
    }
    Ok(next.run(req).await)
}

impl Guard {
    /// Passes the request on untouched, or rebuilt when the body was read.
    async fn check(
        &self,
        state: &AppState,
        params: &PathParams,
        req: Request,
    ) -> Result<Request, AppError> {
        let user = req.extensions().get::<AuthUser>().cloned();

        match *self {
            Guard::Role(role) => match user {
                Some(user) if user.role == role => Ok(req),
                _ => Err(AppError::Forbidden),
            },

            Guard::Ownership => match (user, params.id("id")) {
                (Some(user), Some(id)) if user.id == id => Ok(req),
                _ => Err(AppError::Forbidden),
            },

            Guard::CriticLimit => {
                let user = user.ok_or(AppError::Forbidden)?;
                let Some(film_id) = params.id("id") else {
                    return Ok(req);
                };
                if state.repos.critics.exists_for(user.id, film_id).await? {
                    tracing::debug!(user_id = user.id, film_id, "critic already posted");
                    return Err(AppError::Forbidden);
                }
                Ok(req)
            }

            Guard::FilmDeletable => {
                let Some(film_id) = params.id("id") else {
                    return Ok(req);
                };
                match state.repos.films.has_relations(film_id).await? {
                    Some(true) => Err(AppError::Forbidden),
                    Some(false) | None => Ok(req),
                }
            }

            Guard::PasswordConfirmation => confirm_password(req).await,
        }
    }
}

/// Buffers the body, compares the two password fields and hands the request on
/// with the same bytes. A body that is not a password payload is left for the
/// handler's validation to reject.
async fn confirm_password(req: Request) -> Result<Request, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_GUARDED_BODY)
        .await
        .map_err(|_| AppError::InvalidData(ValidationErrors::single("body", "max")))?;

    if let Ok(input) = serde_json::from_slice::<PasswordInput>(&bytes) {
        if input.new_password != input.password_confirmation {
            return Err(AppError::Forbidden);
        }
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}
