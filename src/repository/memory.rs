use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    ActorRepository, CriticRepository, Entity, FilmRepository, LanguageRepository, Page,
    PageRequest, RepoError, RepoResult, Repository, TokenRepository, UserRepository,
};
use crate::{
    constants::{ROLE_ADMIN, ROLE_ADMIN_ID, ROLE_USER, ROLE_USER_ID},
    models::{AccessToken, Actor, Critic, Film, Language, NewLanguage, User},
};

/// One table: rows keyed by id plus the id sequence.
pub struct Table<E> {
    rows: BTreeMap<i64, E>,
    last_id: i64,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<E: Entity> Table<E> {
    fn insert(&mut self, new: E::New) -> E {
        self.last_id += 1;
        let row = E::from_new(self.last_id, new, Utc::now());
        self.rows.insert(row.id(), row.clone());
        row
    }

    fn page(&self, request: PageRequest) -> Page<E> {
        let total = self.rows.len() as u64;
        let items: Vec<E> = if request.size == 0 {
            self.rows.values().cloned().collect()
        } else {
            self.rows
                .values()
                .skip(request.offset() as usize)
                .take(request.size as usize)
                .cloned()
                .collect()
        };
        Page {
            items,
            page: if request.size == 0 { 1 } else { request.number },
            per_page: request.size,
            total,
        }
    }

    fn get(&self, id: i64) -> RepoResult<E> {
        self.rows.get(&id).cloned().ok_or(RepoError::NotFound)
    }
}

#[derive(Default)]
pub struct Store {
    roles: BTreeMap<i64, String>,
    users: Table<User>,
    films: Table<Film>,
    critics: Table<Critic>,
    languages: Table<Language>,
    actors: Table<Actor>,
    // (actor_id, film_id)
    actor_film: BTreeSet<(i64, i64)>,
    tokens: BTreeMap<i64, AccessToken>,
    last_token_id: i64,
}

/// Entities the in-memory store knows how to locate, with the constraint
/// hooks the Postgres schema enforces. The defaults accept everything.
pub trait Stored: Entity {
    fn table(store: &Store) -> &Table<Self>;
    fn table_mut(store: &mut Store) -> &mut Table<Self>;

    fn check_insert(_store: &Store, _new: &Self::New) -> RepoResult<()> {
        Ok(())
    }

    fn check_update(_store: &Store, _id: i64, _changes: &Self::Changes) -> RepoResult<()> {
        Ok(())
    }

    /// Runs before the row is removed; may refuse (RESTRICT) or cascade.
    fn on_delete(_store: &mut Store, _id: i64) -> RepoResult<()> {
        Ok(())
    }
}

impl Stored for User {
    fn table(store: &Store) -> &Table<Self> {
        &store.users
    }
    fn table_mut(store: &mut Store) -> &mut Table<Self> {
        &mut store.users
    }

    fn check_insert(store: &Store, new: &Self::New) -> RepoResult<()> {
        if store.users.rows.values().any(|u| u.login == new.login) {
            return Err(RepoError::Conflict("users_login_key".into()));
        }
        if store.users.rows.values().any(|u| u.email == new.email) {
            return Err(RepoError::Conflict("users_email_key".into()));
        }
        if !store.roles.contains_key(&new.role_id) {
            return Err(RepoError::Conflict("users_role_id_fkey".into()));
        }
        Ok(())
    }

    fn check_update(store: &Store, id: i64, changes: &Self::Changes) -> RepoResult<()> {
        if let Some(email) = &changes.email {
            if store.users.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Conflict("users_email_key".into()));
            }
        }
        Ok(())
    }

    // ON DELETE CASCADE for critics and tokens.
    fn on_delete(store: &mut Store, id: i64) -> RepoResult<()> {
        store.critics.rows.retain(|_, c| c.user_id != id);
        store.tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }
}

impl Stored for Film {
    fn table(store: &Store) -> &Table<Self> {
        &store.films
    }
    fn table_mut(store: &mut Store) -> &mut Table<Self> {
        &mut store.films
    }

    fn check_insert(store: &Store, new: &Self::New) -> RepoResult<()> {
        if !store.languages.rows.contains_key(&new.language_id) {
            return Err(RepoError::Conflict("films_language_id_fkey".into()));
        }
        Ok(())
    }

    fn check_update(store: &Store, _id: i64, changes: &Self::Changes) -> RepoResult<()> {
        match changes.language_id {
            Some(language_id) if !store.languages.rows.contains_key(&language_id) => {
                Err(RepoError::Conflict("films_language_id_fkey".into()))
            }
            _ => Ok(()),
        }
    }

    // ON DELETE RESTRICT from critics and actor_film.
    fn on_delete(store: &mut Store, id: i64) -> RepoResult<()> {
        if store.critics.rows.values().any(|c| c.film_id == id)
            || store.actor_film.iter().any(|(_, film_id)| *film_id == id)
        {
            return Err(RepoError::Conflict("film is still referenced".into()));
        }
        Ok(())
    }
}

impl Stored for Critic {
    fn table(store: &Store) -> &Table<Self> {
        &store.critics
    }
    fn table_mut(store: &mut Store) -> &mut Table<Self> {
        &mut store.critics
    }

    fn check_insert(store: &Store, new: &Self::New) -> RepoResult<()> {
        if !store.users.rows.contains_key(&new.user_id) {
            return Err(RepoError::Conflict("critics_user_id_fkey".into()));
        }
        if !store.films.rows.contains_key(&new.film_id) {
            return Err(RepoError::Conflict("critics_film_id_fkey".into()));
        }
        if store
            .critics
            .rows
            .values()
            .any(|c| c.user_id == new.user_id && c.film_id == new.film_id)
        {
            return Err(RepoError::Conflict("critics_user_film_unique".into()));
        }
        Ok(())
    }
}

impl Stored for Language {
    fn table(store: &Store) -> &Table<Self> {
        &store.languages
    }
    fn table_mut(store: &mut Store) -> &mut Table<Self> {
        &mut store.languages
    }

    fn on_delete(store: &mut Store, id: i64) -> RepoResult<()> {
        if store.films.rows.values().any(|f| f.language_id == id) {
            return Err(RepoError::Conflict("films_language_id_fkey".into()));
        }
        Ok(())
    }
}

impl Stored for Actor {
    fn table(store: &Store) -> &Table<Self> {
        &store.actors
    }
    fn table_mut(store: &mut Store) -> &mut Table<Self> {
        &mut store.actors
    }

    fn on_delete(store: &mut Store, id: i64) -> RepoResult<()> {
        store.actor_film.retain(|(actor_id, _)| *actor_id != id);
        Ok(())
    }
}

/// InMemoryRepository
///
/// A storage backend kept entirely in process memory, mirroring the constraints
/// of the Postgres schema (unique keys, foreign keys, cascades). Used by the
/// integration tests so the full router can run without a database.
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates a store holding the same seed rows as the initial migration.
    pub fn new() -> Self {
        let mut store = Store::default();
        store.roles.insert(ROLE_USER_ID, ROLE_USER.to_string());
        store.roles.insert(ROLE_ADMIN_ID, ROLE_ADMIN.to_string());
        for name in ["English", "French", "Italian", "Japanese", "German"] {
            store.languages.insert(NewLanguage {
                name: name.to_string(),
            });
        }
        Self {
            store: RwLock::new(store),
        }
    }
}

#[async_trait]
impl<E: Stored> Repository<E> for InMemoryRepository {
    async fn create(&self, new: E::New) -> RepoResult<E> {
        let mut store = self.store.write().await;
        E::check_insert(&store, &new)?;
        Ok(E::table_mut(&mut store).insert(new))
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<E>> {
        let store = self.store.read().await;
        Ok(E::table(&store).page(page))
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<E> {
        let store = self.store.read().await;
        E::table(&store).get(id)
    }

    async fn update(&self, id: i64, changes: E::Changes) -> RepoResult<E> {
        let mut store = self.store.write().await;
        if !E::table(&store).rows.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        E::check_update(&store, id, &changes)?;
        let row = E::table_mut(&mut store)
            .rows
            .get_mut(&id)
            .ok_or(RepoError::NotFound)?;
        row.apply(changes, Utc::now());
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let mut store = self.store.write().await;
        if !E::table(&store).rows.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        E::on_delete(&mut store, id)?;
        E::table_mut(&mut store).rows.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_by_login(&self, login: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.rows.values().find(|u| u.login == login).cloned())
    }

    async fn login_taken(&self, login: &str) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store.users.rows.values().any(|u| u.login == login))
    }

    async fn email_taken(&self, email: &str) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store.users.rows.values().any(|u| u.email == email))
    }

    async fn update_password(&self, id: i64, password_hash: String) -> RepoResult<User> {
        let mut store = self.store.write().await;
        let user = store.users.rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.password = password_hash;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn role_name(&self, role_id: i64) -> RepoResult<Option<String>> {
        let store = self.store.read().await;
        Ok(store.roles.get(&role_id).cloned())
    }
}

#[async_trait]
impl FilmRepository for InMemoryRepository {
    async fn has_relations(&self, film_id: i64) -> RepoResult<Option<bool>> {
        let store = self.store.read().await;
        if !store.films.rows.contains_key(&film_id) {
            return Ok(None);
        }
        let has_critics = store.critics.rows.values().any(|c| c.film_id == film_id);
        let has_actors = store.actor_film.iter().any(|(_, f)| *f == film_id);
        Ok(Some(has_critics || has_actors))
    }

    async fn attach_actor(&self, film_id: i64, actor_id: i64) -> RepoResult<()> {
        let mut store = self.store.write().await;
        if !store.films.rows.contains_key(&film_id) || !store.actors.rows.contains_key(&actor_id)
        {
            return Err(RepoError::NotFound);
        }
        // Re-attaching is a no-op, like ON CONFLICT DO NOTHING.
        store.actor_film.insert((actor_id, film_id));
        Ok(())
    }
}

#[async_trait]
impl CriticRepository for InMemoryRepository {
    async fn exists_for(&self, user_id: i64, film_id: i64) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store
            .critics
            .rows
            .values()
            .any(|c| c.user_id == user_id && c.film_id == film_id))
    }
}

#[async_trait]
impl LanguageRepository for InMemoryRepository {
    async fn exists(&self, id: i64) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store.languages.rows.contains_key(&id))
    }
}

#[async_trait]
impl ActorRepository for InMemoryRepository {}

#[async_trait]
impl TokenRepository for InMemoryRepository {
    async fn issue(&self, user_id: i64, name: &str, token_hash: String) -> RepoResult<AccessToken> {
        let mut store = self.store.write().await;
        if !store.users.rows.contains_key(&user_id) {
            return Err(RepoError::Conflict("personal_access_tokens_user_id_fkey".into()));
        }
        store.last_token_id += 1;
        let token = AccessToken {
            id: store.last_token_id,
            user_id,
            name: name.to_string(),
            token: token_hash,
            created_at: Utc::now(),
        };
        store.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find(&self, id: i64) -> RepoResult<Option<AccessToken>> {
        let store = self.store.read().await;
        Ok(store.tokens.get(&id).cloned())
    }

    async fn revoke_all(&self, user_id: i64) -> RepoResult<u64> {
        let mut store = self.store.write().await;
        let before = store.tokens.len();
        store.tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - store.tokens.len()) as u64)
    }
}
