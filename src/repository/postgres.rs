use async_trait::async_trait;
use sqlx::{FromRow, PgPool, postgres::PgRow};

use super::{
    ActorRepository, CriticRepository, Entity, FilmRepository, LanguageRepository, Page,
    PageRequest, RepoError, RepoResult, Repository, TokenRepository, UserRepository,
};
use crate::models::{
    AccessToken, Actor, ActorChanges, Critic, CriticChanges, Film, FilmChanges, Language,
    LanguageChanges, NewActor, NewCritic, NewFilm, NewLanguage, NewUser, User, UserChanges,
};

/// PostgresRepository
///
/// The production backend. One pool serves every entity; each `Repository<E>`
/// impl below uses the generic helpers for reads and deletes and its own SQL
/// for inserts and updates.
///
/// Queries are checked at runtime (`query_as::<_, T>`), so the crate builds
/// without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps driver errors onto the repository taxonomy.
fn classify(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() =>
        {
            RepoError::Conflict(db.message().to_string())
        }
        other => {
            tracing::error!("database error: {:?}", other);
            RepoError::Database(other)
        }
    }
}

// --- Generic helpers shared by every entity ---

async fn fetch_page<E>(pool: &PgPool, request: PageRequest) -> RepoResult<Page<E>>
where
    E: Entity + for<'r> FromRow<'r, PgRow>,
{
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", E::TABLE))
        .fetch_one(pool)
        .await
        .map_err(classify)?;

    let items = if request.size == 0 {
        sqlx::query_as::<_, E>(&format!(
            "SELECT {} FROM {} ORDER BY id",
            E::COLUMNS,
            E::TABLE
        ))
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, E>(&format!(
            "SELECT {} FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            E::COLUMNS,
            E::TABLE
        ))
        .bind(i64::from(request.size))
        .bind(request.offset() as i64)
        .fetch_all(pool)
        .await
    }
    .map_err(classify)?;

    Ok(Page {
        items,
        page: if request.size == 0 { 1 } else { request.number },
        per_page: request.size,
        total: total.max(0) as u64,
    })
}

async fn fetch_by_id<E>(pool: &PgPool, id: i64) -> RepoResult<E>
where
    E: Entity + for<'r> FromRow<'r, PgRow>,
{
    sqlx::query_as::<_, E>(&format!(
        "SELECT {} FROM {} WHERE id = $1",
        E::COLUMNS,
        E::TABLE
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(classify)?
    .ok_or(RepoError::NotFound)
}

async fn delete_by_id<E: Entity>(pool: &PgPool, id: i64) -> RepoResult<()> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", E::TABLE))
        .bind(id)
        .execute(pool)
        .await
        .map_err(classify)?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

async fn exists(pool: &PgPool, sql: &str, first: i64, second: Option<i64>) -> RepoResult<bool> {
    let mut query = sqlx::query_scalar::<_, bool>(sql).bind(first);
    if let Some(second) = second {
        query = query.bind(second);
    }
    query.fetch_one(pool).await.map_err(classify)
}

// --- Users ---

#[async_trait]
impl Repository<User> for PostgresRepository {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (login, email, password, first_name, last_name, role_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            User::COLUMNS
        ))
        .bind(new.login)
        .bind(new.email)
        .bind(new.password)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<User>> {
        fetch_page(&self.pool, page).await
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<User> {
        fetch_by_id(&self.pool, id).await
    }

    async fn update(&self, id: i64, changes: UserChanges) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = COALESCE($2, email), \
                 first_name = COALESCE($3, first_name), \
                 last_name = COALESCE($4, last_name), \
                 role_id = COALESCE($5, role_id), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            User::COLUMNS
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    /// Critics and tokens go with the user (ON DELETE CASCADE).
    async fn delete(&self, id: i64) -> RepoResult<()> {
        delete_by_id::<User>(&self.pool, id).await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn find_by_login(&self, login: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE login = $1",
            User::COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn login_taken(&self, login: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE login = $1)")
            .bind(login)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn email_taken(&self, email: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_password(&self, id: i64, password_hash: String) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            User::COLUMNS
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    async fn role_name(&self, role_id: i64) -> RepoResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT name FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }
}

// --- Films ---

#[async_trait]
impl Repository<Film> for PostgresRepository {
    async fn create(&self, new: NewFilm) -> RepoResult<Film> {
        sqlx::query_as::<_, Film>(&format!(
            "INSERT INTO films (title, release_year, length, description, rating, \
                 special_features, image, language_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            Film::COLUMNS
        ))
        .bind(new.title)
        .bind(new.release_year)
        .bind(new.length)
        .bind(new.description)
        .bind(new.rating)
        .bind(new.special_features)
        .bind(new.image)
        .bind(new.language_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<Film>> {
        fetch_page(&self.pool, page).await
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Film> {
        fetch_by_id(&self.pool, id).await
    }

    async fn update(&self, id: i64, changes: FilmChanges) -> RepoResult<Film> {
        sqlx::query_as::<_, Film>(&format!(
            "UPDATE films SET title = COALESCE($2, title), \
                 release_year = COALESCE($3, release_year), \
                 length = COALESCE($4, length), \
                 description = COALESCE($5, description), \
                 rating = COALESCE($6, rating), \
                 special_features = COALESCE($7, special_features), \
                 image = COALESCE($8, image), \
                 language_id = COALESCE($9, language_id), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            Film::COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.release_year)
        .bind(changes.length)
        .bind(changes.description)
        .bind(changes.rating)
        .bind(changes.special_features)
        .bind(changes.image)
        .bind(changes.language_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    /// Refused with `Conflict` while critics or actors still reference the film.
    async fn delete(&self, id: i64) -> RepoResult<()> {
        delete_by_id::<Film>(&self.pool, id).await
    }
}

#[async_trait]
impl FilmRepository for PostgresRepository {
    async fn has_relations(&self, film_id: i64) -> RepoResult<Option<bool>> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM critics WHERE film_id = f.id)
                OR EXISTS (SELECT 1 FROM actor_film WHERE film_id = f.id)
            FROM films f
            WHERE f.id = $1
            "#,
        )
        .bind(film_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn attach_actor(&self, film_id: i64, actor_id: i64) -> RepoResult<()> {
        let result = sqlx::query(
            "INSERT INTO actor_film (actor_id, film_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(actor_id)
        .bind(film_id)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            // A missing film or actor surfaces as a foreign key violation.
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(RepoError::NotFound)
            }
            Err(err) => Err(classify(err)),
        }
    }
}

// --- Critics ---

#[async_trait]
impl Repository<Critic> for PostgresRepository {
    /// The UNIQUE (user_id, film_id) constraint turns a raced duplicate into `Conflict`.
    async fn create(&self, new: NewCritic) -> RepoResult<Critic> {
        sqlx::query_as::<_, Critic>(&format!(
            "INSERT INTO critics (user_id, film_id, score, comment) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            Critic::COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.film_id)
        .bind(new.score)
        .bind(new.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<Critic>> {
        fetch_page(&self.pool, page).await
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Critic> {
        fetch_by_id(&self.pool, id).await
    }

    async fn update(&self, id: i64, changes: CriticChanges) -> RepoResult<Critic> {
        sqlx::query_as::<_, Critic>(&format!(
            "UPDATE critics SET score = COALESCE($2, score), \
                 comment = COALESCE($3, comment), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            Critic::COLUMNS
        ))
        .bind(id)
        .bind(changes.score)
        .bind(changes.comment)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        delete_by_id::<Critic>(&self.pool, id).await
    }
}

#[async_trait]
impl CriticRepository for PostgresRepository {
    async fn exists_for(&self, user_id: i64, film_id: i64) -> RepoResult<bool> {
        exists(
            &self.pool,
            "SELECT EXISTS (SELECT 1 FROM critics WHERE user_id = $1 AND film_id = $2)",
            user_id,
            Some(film_id),
        )
        .await
    }
}

// --- Languages ---

#[async_trait]
impl Repository<Language> for PostgresRepository {
    async fn create(&self, new: NewLanguage) -> RepoResult<Language> {
        sqlx::query_as::<_, Language>("INSERT INTO languages (name) VALUES ($1) RETURNING id, name")
            .bind(new.name)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<Language>> {
        fetch_page(&self.pool, page).await
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Language> {
        fetch_by_id(&self.pool, id).await
    }

    async fn update(&self, id: i64, changes: LanguageChanges) -> RepoResult<Language> {
        sqlx::query_as::<_, Language>(
            "UPDATE languages SET name = COALESCE($2, name) WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(changes.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        delete_by_id::<Language>(&self.pool, id).await
    }
}

#[async_trait]
impl LanguageRepository for PostgresRepository {
    async fn exists(&self, id: i64) -> RepoResult<bool> {
        exists(
            &self.pool,
            "SELECT EXISTS (SELECT 1 FROM languages WHERE id = $1)",
            id,
            None,
        )
        .await
    }
}

// --- Actors ---

#[async_trait]
impl Repository<Actor> for PostgresRepository {
    async fn create(&self, new: NewActor) -> RepoResult<Actor> {
        sqlx::query_as::<_, Actor>(&format!(
            "INSERT INTO actors (first_name, last_name) VALUES ($1, $2) RETURNING {}",
            Actor::COLUMNS
        ))
        .bind(new.first_name)
        .bind(new.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_all(&self, page: PageRequest) -> RepoResult<Page<Actor>> {
        fetch_page(&self.pool, page).await
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Actor> {
        fetch_by_id(&self.pool, id).await
    }

    async fn update(&self, id: i64, changes: ActorChanges) -> RepoResult<Actor> {
        sqlx::query_as::<_, Actor>(&format!(
            "UPDATE actors SET first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            Actor::COLUMNS
        ))
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        delete_by_id::<Actor>(&self.pool, id).await
    }
}

#[async_trait]
impl ActorRepository for PostgresRepository {}

// --- Tokens ---

#[async_trait]
impl TokenRepository for PostgresRepository {
    async fn issue(&self, user_id: i64, name: &str, token_hash: String) -> RepoResult<AccessToken> {
        sqlx::query_as::<_, AccessToken>(
            "INSERT INTO personal_access_tokens (user_id, name, token) VALUES ($1, $2, $3) \
             RETURNING id, user_id, name, token, created_at",
        )
        .bind(user_id)
        .bind(name)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find(&self, id: i64) -> RepoResult<Option<AccessToken>> {
        sqlx::query_as::<_, AccessToken>(
            "SELECT id, user_id, name, token, created_at FROM personal_access_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn revoke_all(&self, user_id: i64) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM personal_access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }
}
