//! Repository layer
//!
//! `Repository<E>` is the uniform CRUD contract shared by every entity. Entities
//! that need more than CRUD get an extension trait on top of it. Two backends
//! implement all of them: `PostgresRepository` for the running service and
//! `InMemoryRepository` for tests and local experiments.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AccessToken, Actor, ActorChanges, Critic, CriticChanges, Film, FilmChanges, Language,
    LanguageChanges, NewActor, NewCritic, NewFilm, NewLanguage, NewUser, User, UserChanges,
};

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Storage failures surfaced to the service layer.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("no row matches")]
    NotFound,
    /// A uniqueness or relation constraint rejected the write.
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity
///
/// Static description of a persisted type: its table, selected columns, and the
/// shapes used to create and partially update it.
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    type New: Send + 'static;
    type Changes: Send + 'static;

    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn id(&self) -> i64;

    /// Builds the stored value for a freshly assigned id.
    fn from_new(id: i64, new: Self::New, now: DateTime<Utc>) -> Self;

    /// Applies a partial update in place.
    fn apply(&mut self, changes: Self::Changes, now: DateTime<Utc>);
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    /// 1-based page number.
    pub page: u32,
    /// 0 when the whole collection was requested.
    pub per_page: u32,
    pub total: u64,
}

impl<E> Page<E> {
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }
}

/// Which slice of a collection `get_all` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 0 returns the whole collection.
    pub size: u32,
    /// 1-based; ignored when `size` is 0.
    pub number: u32,
}

impl PageRequest {
    pub fn all() -> Self {
        Self { size: 0, number: 1 }
    }

    pub fn page(size: u32, number: u32) -> Self {
        Self {
            size,
            number: number.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }
}

/// Repository
///
/// The CRUD contract every entity store implements.
///
/// **Send + Sync + async_trait** make `Arc<dyn ...>` trait objects shareable
/// across axum's task boundaries.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, new: E::New) -> RepoResult<E>;
    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<E>>;
    async fn get_by_id(&self, id: i64) -> RepoResult<E>;
    /// Partial update; fails with `NotFound` if no row matches.
    async fn update(&self, id: i64, changes: E::Changes) -> RepoResult<E>;
    async fn delete(&self, id: i64) -> RepoResult<()>;
}

#[async_trait]
pub trait UserRepository: Repository<User> {
    async fn find_by_login(&self, login: &str) -> RepoResult<Option<User>>;
    async fn login_taken(&self, login: &str) -> RepoResult<bool>;
    async fn email_taken(&self, email: &str) -> RepoResult<bool>;
    /// Stores an already hashed password.
    async fn update_password(&self, id: i64, password_hash: String) -> RepoResult<User>;
    async fn role_name(&self, role_id: i64) -> RepoResult<Option<String>>;
}

#[async_trait]
pub trait FilmRepository: Repository<Film> {
    /// `None` when the film does not exist, otherwise whether any critic or
    /// actor references it.
    async fn has_relations(&self, film_id: i64) -> RepoResult<Option<bool>>;
    async fn attach_actor(&self, film_id: i64, actor_id: i64) -> RepoResult<()>;
}

#[async_trait]
pub trait CriticRepository: Repository<Critic> {
    async fn exists_for(&self, user_id: i64, film_id: i64) -> RepoResult<bool>;
}

#[async_trait]
pub trait LanguageRepository: Repository<Language> {
    async fn exists(&self, id: i64) -> RepoResult<bool>;
}

#[async_trait]
pub trait ActorRepository: Repository<Actor> {}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Persists a token row; `token_hash` is the digest of the secret.
    async fn issue(&self, user_id: i64, name: &str, token_hash: String) -> RepoResult<AccessToken>;
    async fn find(&self, id: i64) -> RepoResult<Option<AccessToken>>;
    /// Deletes every token of the user, returning how many were removed.
    async fn revoke_all(&self, user_id: i64) -> RepoResult<u64>;
}

/// RepositoryState
///
/// Per-entity handles onto one storage backend, shared through the app state.
#[derive(Clone)]
pub struct RepositoryState {
    pub users: Arc<dyn UserRepository>,
    pub films: Arc<dyn FilmRepository>,
    pub critics: Arc<dyn CriticRepository>,
    pub languages: Arc<dyn LanguageRepository>,
    pub actors: Arc<dyn ActorRepository>,
    pub tokens: Arc<dyn TokenRepository>,
}

impl RepositoryState {
    /// Points every handle at the same backend.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserRepository
            + FilmRepository
            + CriticRepository
            + LanguageRepository
            + ActorRepository
            + TokenRepository
            + 'static,
    {
        Self {
            users: backend.clone(),
            films: backend.clone(),
            critics: backend.clone(),
            languages: backend.clone(),
            actors: backend.clone(),
            tokens: backend,
        }
    }
}

// --- Entity descriptions ---

impl Entity for User {
    type New = NewUser;
    type Changes = UserChanges;

    const TABLE: &'static str = "users";
    const COLUMNS: &'static str =
        "id, login, email, password, first_name, last_name, role_id, created_at, updated_at";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_new(id: i64, new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            login: new.login,
            email: new.email,
            password: new.password,
            first_name: new.first_name,
            last_name: new.last_name,
            role_id: new.role_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: UserChanges, now: DateTime<Utc>) {
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(role_id) = changes.role_id {
            self.role_id = role_id;
        }
        self.updated_at = now;
    }
}

impl Entity for Film {
    type New = NewFilm;
    type Changes = FilmChanges;

    const TABLE: &'static str = "films";
    const COLUMNS: &'static str = "id, title, release_year, length, description, rating, \
         special_features, image, language_id, created_at, updated_at";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_new(id: i64, new: NewFilm, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            release_year: new.release_year,
            length: new.length,
            description: new.description,
            rating: new.rating,
            special_features: new.special_features,
            image: new.image,
            language_id: new.language_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: FilmChanges, now: DateTime<Utc>) {
        let FilmChanges {
            title,
            release_year,
            length,
            description,
            rating,
            special_features,
            image,
            language_id,
        } = changes;
        self.title = title.unwrap_or(std::mem::take(&mut self.title));
        self.release_year = release_year.unwrap_or(self.release_year);
        self.length = length.unwrap_or(self.length);
        self.description = description.unwrap_or(std::mem::take(&mut self.description));
        self.rating = rating.unwrap_or(std::mem::take(&mut self.rating));
        self.special_features =
            special_features.unwrap_or(std::mem::take(&mut self.special_features));
        self.image = image.unwrap_or(std::mem::take(&mut self.image));
        self.language_id = language_id.unwrap_or(self.language_id);
        self.updated_at = now;
    }
}

impl Entity for Critic {
    type New = NewCritic;
    type Changes = CriticChanges;

    const TABLE: &'static str = "critics";
    const COLUMNS: &'static str = "id, user_id, film_id, score, comment, created_at, updated_at";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_new(id: i64, new: NewCritic, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            film_id: new.film_id,
            score: new.score,
            comment: new.comment,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: CriticChanges, now: DateTime<Utc>) {
        if let Some(score) = changes.score {
            self.score = score;
        }
        if let Some(comment) = changes.comment {
            self.comment = comment;
        }
        self.updated_at = now;
    }
}

impl Entity for Language {
    type New = NewLanguage;
    type Changes = LanguageChanges;

    const TABLE: &'static str = "languages";
    const COLUMNS: &'static str = "id, name";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_new(id: i64, new: NewLanguage, _now: DateTime<Utc>) -> Self {
        Self { id, name: new.name }
    }

    fn apply(&mut self, changes: LanguageChanges, _now: DateTime<Utc>) {
        if let Some(name) = changes.name {
            self.name = name;
        }
    }
}

impl Entity for Actor {
    type New = NewActor;
    type Changes = ActorChanges;

    const TABLE: &'static str = "actors";
    const COLUMNS: &'static str = "id, first_name, last_name, created_at, updated_at";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_new(id: i64, new: NewActor, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: ActorChanges, now: DateTime<Utc>) {
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        self.updated_at = now;
    }
}
