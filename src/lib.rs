use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod validation;

// Routers grouped by pipeline (public, session, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public, session};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use middleware::RateLimits;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document assembled from every `#[utoipa::path]` handler and
/// `ToSchema` model. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_films, handlers::get_film, handlers::create_film,
        handlers::update_film, handlers::delete_film, handlers::create_critic,
        handlers::create_actor, handlers::attach_actor, handlers::register,
        handlers::login, handlers::logout, handlers::show_user,
        handlers::update_password
    ),
    components(
        schemas(
            models::User, models::Film, models::Critic, models::Actor, models::Language,
            models::Role, models::RegisterInput, models::LoginInput, models::PasswordInput,
            models::FilmInput, models::CriticInput, models::ActorInput, models::TokenResponse,
            models::PageMeta, models::FilmCollection, models::FilmResource,
            models::UserResource, error::ErrorBody, error::MessageBody,
        )
    ),
    tags(
        (name = "films-api", description = "Films catalog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler and middleware:
/// storage handles, configuration and the throttle limiters.
#[derive(Clone)]
pub struct AppState {
    pub repos: RepositoryState,
    pub config: AppConfig,
    /// Limiter state lives here so it survives for the whole process and is
    /// shared by every route of a group.
    pub limits: RateLimits,
}

impl AppState {
    pub fn new(repos: RepositoryState, config: AppConfig) -> Self {
        let limits = RateLimits::new(&config);
        Self {
            repos,
            config,
            limits,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repos.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for RateLimits {
    fn from_ref(app_state: &AppState) -> RateLimits {
        app_state.limits.clone()
    }
}

/// create_router
///
/// Assembles every route group under `/api`, the Swagger UI, and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(session::session_routes(&state))
        .merge(authenticated::authenticated_routes(&state))
        .merge(admin::admin_routes(&state))
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` set above so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
