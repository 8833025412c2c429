use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    auth::{self, AuthUser},
    constants::{CREATED_MSG, ROLE_USER_ID, SEARCH_PAGINATION, UPDATED_MSG},
    error::{AppError, ErrorBody, MessageBody},
    models::{
        ActorInput, CriticInput, FilmChanges, FilmCollection, FilmInput, FilmResource, LoginInput,
        NewCritic, NewUser, PageMeta, PasswordInput, RegisterInput, TokenResponse, UserResource,
    },
    repository::{PageRequest, RepoError},
    validation::{self, ValidationErrors},
};

// --- Query Structs ---

/// FilmListParams
///
/// `GET /films` returns the whole catalog unless `page` is given, in which case
/// it returns that page of `SEARCH_PAGINATION` films with a `meta` block.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct FilmListParams {
    /// 1-based page number. Unparsable values fall back to the first page.
    pub page: Option<String>,
}

fn created() -> impl IntoResponse {
    (StatusCode::CREATED, Json(MessageBody::new(CREATED_MSG)))
}

// --- Films ---

/// list_films
///
/// [Public Route] Lists films, optionally paginated.
#[utoipa::path(
    get,
    path = "/api/films",
    params(FilmListParams),
    responses(
        (status = 200, description = "Film list", body = FilmCollection),
        (status = 500, description = "Server error", body = ErrorBody)
    )
)]
pub async fn list_films(
    State(state): State<AppState>,
    Query(params): Query<FilmListParams>,
) -> Result<Json<FilmCollection>, AppError> {
    let request = match params.page {
        Some(raw) => PageRequest::page(SEARCH_PAGINATION, raw.trim().parse().unwrap_or(1)),
        None => PageRequest::all(),
    };
    let paginated = request.size > 0;

    let page = state.repos.films.get_all(request).await?;
    let meta = paginated.then(|| PageMeta {
        current_page: page.page,
        per_page: page.per_page,
        total: page.total,
        last_page: page.last_page(),
    });

    Ok(Json(FilmCollection {
        data: page.items,
        meta,
    }))
}

/// get_film
///
/// [Public Route] Retrieves one film.
#[utoipa::path(
    get,
    path = "/api/films/{id}",
    params(("id" = i64, Path, description = "Film ID")),
    responses(
        (status = 200, description = "Found", body = FilmResource),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_film(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<FilmResource>, AppError> {
    let Path(id) = path?;
    let film = state.repos.films.get_by_id(id).await?;
    Ok(Json(FilmResource { data: film }))
}

/// create_film
///
/// [Admin Route] Adds a film to the catalog. The language must exist.
#[utoipa::path(
    post,
    path = "/api/films",
    request_body = FilmInput,
    responses(
        (status = 201, description = "Created", body = MessageBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 422, description = "Invalid data", body = ErrorBody)
    )
)]
pub async fn create_film(
    State(state): State<AppState>,
    payload: Result<Json<FilmInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let film = validation::film(input)?;
    validation::language_exists(&film, state.repos.languages.as_ref()).await?;

    let film = state.repos.films.create(film).await?;
    tracing::info!(film_id = film.id, "film created");
    Ok(created())
}

/// update_film
///
/// [Admin Route] Replaces every field of a film. The body is validated before
/// the film is looked up, so an invalid body on a missing film is a 422.
#[utoipa::path(
    put,
    path = "/api/films/{id}",
    params(("id" = i64, Path, description = "Film ID")),
    request_body = FilmInput,
    responses(
        (status = 200, description = "Updated", body = MessageBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 422, description = "Invalid data", body = ErrorBody)
    )
)]
pub async fn update_film(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<FilmInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(input) = payload?;
    let film = validation::film(input)?;
    validation::language_exists(&film, state.repos.languages.as_ref()).await?;

    state.repos.films.update(id, FilmChanges::from(film)).await?;
    Ok(Json(MessageBody::new(UPDATED_MSG)))
}

/// delete_film
///
/// [Admin Route] Removes a film without critics or actors. The `FilmDeletable`
/// guard has already refused films that still have relations.
#[utoipa::path(
    delete,
    path = "/api/films/{id}",
    params(("id" = i64, Path, description = "Film ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin, or film still referenced", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_film(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state.repos.films.delete(id).await?;
    tracing::info!(film_id = id, "film deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Critics ---

/// create_critic
///
/// [Authenticated Route] Posts the caller's review of a film. The
/// `CriticLimit` guard has already refused a second review; the storage
/// constraint turns a raced duplicate into 403 as well.
#[utoipa::path(
    post,
    path = "/api/films/{id}/critics",
    params(("id" = i64, Path, description = "Film ID")),
    request_body = CriticInput,
    responses(
        (status = 201, description = "Created", body = MessageBody),
        (status = 403, description = "Already reviewed", body = ErrorBody),
        (status = 422, description = "Invalid data or unknown film", body = ErrorBody)
    )
)]
pub async fn create_critic(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CriticInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(film_id) = path?;
    let Json(input) = payload?;
    let review = validation::critic(input)?;

    match state.repos.films.get_by_id(film_id).await {
        Ok(_) => {}
        Err(RepoError::NotFound) => {
            return Err(ValidationErrors::single("film_id", "exists").into());
        }
        Err(err) => return Err(err.into()),
    }

    state
        .repos
        .critics
        .create(NewCritic {
            user_id,
            film_id,
            score: review.score,
            comment: review.comment,
        })
        .await?;
    Ok(created())
}

// --- Actors ---

/// create_actor
///
/// [Admin Route] Adds an actor.
#[utoipa::path(
    post,
    path = "/api/actors",
    request_body = ActorInput,
    responses(
        (status = 201, description = "Created", body = MessageBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 422, description = "Invalid data", body = ErrorBody)
    )
)]
pub async fn create_actor(
    State(state): State<AppState>,
    payload: Result<Json<ActorInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let actor = validation::actor(input)?;
    state.repos.actors.create(actor).await?;
    Ok(created())
}

/// attach_actor
///
/// [Admin Route] Links an actor to a film. Linking twice is a no-op.
#[utoipa::path(
    post,
    path = "/api/films/{id}/actors/{actor_id}",
    params(
        ("id" = i64, Path, description = "Film ID"),
        ("actor_id" = i64, Path, description = "Actor ID")
    ),
    responses(
        (status = 201, description = "Created", body = MessageBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Film or actor not found", body = ErrorBody)
    )
)]
pub async fn attach_actor(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((film_id, actor_id)) = path?;
    state.repos.films.attach_actor(film_id, actor_id).await?;
    Ok(created())
}

// --- Accounts ---

/// register
///
/// [Public Route] Creates an account with the "user" role. Every input
/// failure, duplicates included, is a 400.
#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Created", body = MessageBody),
        (status = 400, description = "Invalid data", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = MessageBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload.map_err(|r| AppError::from(r).into_bad_request())?;
    let registration = validation::registration(input).map_err(AppError::BadRequest)?;
    validation::unique_account(&registration, state.repos.users.as_ref())
        .await
        .map_err(AppError::into_bad_request)?;

    let password = auth::hash_password(registration.password, state.config.bcrypt_cost).await?;
    let user = state
        .repos
        .users
        .create(NewUser {
            login: registration.login,
            email: registration.email,
            password,
            first_name: registration.first_name,
            last_name: registration.last_name,
            role_id: ROLE_USER_ID,
        })
        .await
        .map_err(|err| match err {
            // Lost a race with another sign-up for the same login or email.
            RepoError::Conflict(_) => AppError::BadRequest(ValidationErrors::single("login", "unique")),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(created())
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/signin",
    request_body = LoginInput,
    responses(
        (status = 201, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid data", body = ErrorBody),
        (status = 401, description = "Failed to log in", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = MessageBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload.map_err(|r| AppError::from(r).into_bad_request())?;
    let credentials = validation::login(input).map_err(AppError::BadRequest)?;

    let user = state
        .repos
        .users
        .find_by_login(&credentials.login)
        .await?
        .ok_or(AppError::LoginFailed)?;

    if !auth::verify_password(credentials.password, user.password).await? {
        tracing::debug!(user_id = user.id, "password mismatch");
        return Err(AppError::LoginFailed);
    }

    let token = auth::issue_token(state.repos.tokens.as_ref(), user.id).await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// logout
///
/// [Authenticated Route] Revokes every token of the caller, not only the one
/// used for this request.
#[utoipa::path(
    get,
    path = "/api/signout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Unauthenticated", body = MessageBody)
    )
)]
pub async fn logout(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let revoked = state.repos.tokens.revoke_all(id).await?;
    tracing::info!(user_id = id, revoked, "user signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// show_user
///
/// [Authenticated Route] The caller's own profile; the `Ownership` guard
/// refuses anyone else's.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserResource),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn show_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserResource>, AppError> {
    let Path(id) = path?;
    let user = state.repos.users.get_by_id(id).await?;
    Ok(Json(UserResource { data: user }))
}

/// update_password
///
/// [Authenticated Route] Rehashes and stores a new password for the caller.
#[utoipa::path(
    put,
    path = "/api/users/{id}/password",
    params(("id" = i64, Path, description = "User ID")),
    request_body = PasswordInput,
    responses(
        (status = 200, description = "Updated", body = MessageBody),
        (status = 403, description = "Not the owner, or confirmation mismatch", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 422, description = "Invalid data", body = ErrorBody)
    )
)]
pub async fn update_password(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PasswordInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(input) = payload?;
    let new_password = validation::password(input)?;

    let hash = auth::hash_password(new_password, state.config.bcrypt_cost).await?;
    state.repos.users.update_password(id, hash).await?;
    tracing::info!(user_id = id, "password updated");
    Ok(Json(MessageBody::new(UPDATED_MSG)))
}
