use crate::{
    AppState, handlers,
    middleware::{Guard, GuardChain, authenticate, run_guards, throttle},
};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Layer order, outermost first: default
/// throttle group, `authenticate`, then the route's own guard chain.
pub fn authenticated_routes(state: &AppState) -> Router<AppState> {
    let guarded = |guards: &[Guard]| {
        middleware::from_fn_with_state(GuardChain::new(state, guards), run_guards)
    };

    Router::new()
        // POST /films/{id}/critics
        // One critic per user and film.
        .route(
            "/films/{id}/critics",
            post(handlers::create_critic).route_layer(guarded(&[Guard::CriticLimit])),
        )
        // GET /users/{id}
        .route(
            "/users/{id}",
            get(handlers::show_user).route_layer(guarded(&[Guard::Ownership])),
        )
        // PUT|PATCH /users/{id}/password
        // Ownership first, so a stranger gets 403 whatever the body says.
        .route(
            "/users/{id}/password",
            put(handlers::update_password)
                .patch(handlers::update_password)
                .route_layer(guarded(&[Guard::Ownership, Guard::PasswordConfirmation])),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .route_layer(middleware::from_fn_with_state(
            state.limits.default.clone(),
            throttle,
        ))
}
