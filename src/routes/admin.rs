use crate::{
    AppState,
    constants::ROLE_ADMIN,
    handlers,
    middleware::{Guard, GuardChain, authenticate, run_guards, throttle},
};
use axum::{
    Router, middleware,
    routing::{delete, post, put},
};

/// Admin Router Module
///
/// Catalog writes. Every route checks `Role("admin")` right after
/// authentication; film deletion additionally requires the film to be
/// unreferenced. Shares the default throttle group with the authenticated routes.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    let guarded = |guards: &[Guard]| {
        middleware::from_fn_with_state(GuardChain::new(state, guards), run_guards)
    };

    Router::new()
        // POST /films
        .route("/films", post(handlers::create_film))
        // PUT /films/{id}
        .route("/films/{id}", put(handlers::update_film))
        // DELETE /films/{id}
        // Refused with 403 while critics or actors reference the film.
        .route(
            "/films/{id}",
            delete(handlers::delete_film).route_layer(guarded(&[Guard::FilmDeletable])),
        )
        // POST /actors
        .route("/actors", post(handlers::create_actor))
        // POST /films/{id}/actors/{actor_id}
        .route(
            "/films/{id}/actors/{actor_id}",
            post(handlers::attach_actor),
        )
        .route_layer(guarded(&[Guard::Role(ROLE_ADMIN)]))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .route_layer(middleware::from_fn_with_state(
            state.limits.default.clone(),
            throttle,
        ))
}
