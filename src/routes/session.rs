use crate::{
    AppState, handlers,
    middleware::{authenticate, throttle},
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Session Router Module
///
/// Account creation and token lifecycle. All three routes draw from the
/// auth throttle group, so repeated sign-in attempts from one client are
/// capped together with sign-ups and sign-outs.
pub fn session_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // POST /signup
        .route("/signup", post(handlers::register))
        // POST /signin
        // Returns `{ "token": "<id>|<secret>" }`.
        .route("/signin", post(handlers::login))
        // GET /signout
        // Revokes every token of the caller, so it alone needs a bearer token.
        .route(
            "/signout",
            get(handlers::logout).route_layer(middleware::from_fn_with_state(
                state.clone(),
                authenticate,
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.limits.auth.clone(),
            throttle,
        ))
}
