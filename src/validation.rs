//! Request validation
//!
//! Every write endpoint turns its raw payload (all fields optional) into a typed
//! record here before any repository call. Shape rules are pure functions; rules
//! that need the store (uniqueness, foreign keys) are separate async checks run
//! right after them.

use std::fmt;

use axum::extract::rejection::JsonRejection;
use serde::Serialize;

use crate::{
    error::AppError,
    models::{ActorInput, CriticInput, FilmInput, LoginInput, NewActor, NewFilm, PasswordInput, RegisterInput},
    repository::{LanguageRepository, UserRepository},
};

const FIRST_FILM_YEAR: i64 = 1895;

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
}

/// Every rule failure of one request, in the order the fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: &str, rule: &str) -> Self {
        let mut errors = Self::default();
        errors.add(field, rule);
        errors
    }

    pub fn add(&mut self, field: &str, rule: &str) {
        self.0.push(FieldError {
            field: field.to_string(),
            rule: rule.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether `field` failed any rule.
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(self),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.rule))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl From<JsonRejection> for ValidationErrors {
    fn from(rejection: JsonRejection) -> Self {
        Self::single("body", &rejection.body_text())
    }
}

/// Rule runner that records failures and hands back the accepted values.
#[derive(Default)]
struct Rules {
    errors: ValidationErrors,
}

impl Rules {
    /// `required` plus an optional `max` length in characters.
    /// Blank strings count as missing; accepted values are trimmed.
    fn string(&mut self, field: &str, value: Option<String>, max: Option<usize>) -> Option<String> {
        let value = match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.errors.add(field, "required");
                return None;
            }
        };
        if let Some(max) = max {
            if value.chars().count() > max {
                self.errors.add(field, "max");
                return None;
            }
        }
        Some(value)
    }

    /// `required|max:{max}` for passwords: the value is kept byte for byte and
    /// only an empty string counts as missing.
    fn secret(&mut self, field: &str, value: Option<String>, max: usize) -> Option<String> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.errors.add(field, "required");
                return None;
            }
        };
        if value.chars().count() > max {
            self.errors.add(field, "max");
            return None;
        }
        Some(value)
    }

    fn email(&mut self, field: &str, value: Option<String>, max: usize) -> Option<String> {
        let value = self.string(field, value, Some(max))?;
        if !is_email(&value) {
            self.errors.add(field, "email");
            return None;
        }
        Some(value)
    }

    /// `required|integer|min:{min}` narrowed to an i32 column.
    fn integer(&mut self, field: &str, value: Option<i64>, min: i64) -> Option<i32> {
        let Some(value) = value else {
            self.errors.add(field, "required");
            return None;
        };
        if value < min {
            self.errors.add(field, "min");
            return None;
        }
        match i32::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.errors.add(field, "integer");
                None
            }
        }
    }

    fn year(&mut self, field: &str, value: Option<i64>) -> Option<i32> {
        let value = self.integer(field, value, FIRST_FILM_YEAR)?;
        if !(1000..=9999).contains(&value) {
            self.errors.add(field, "digits");
            return None;
        }
        Some(value)
    }

    fn number(&mut self, field: &str, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) if v.is_finite() => Some(v),
            Some(_) => {
                self.errors.add(field, "numeric");
                None
            }
            None => {
                self.errors.add(field, "required");
                None
            }
        }
    }

    fn fail(&mut self, field: &str, rule: &str) {
        self.errors.add(field, rule);
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        self.errors.into_result(value)
    }
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// --- Accounts ---

/// A sign-up request that passed the shape rules. `password` is still plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub login: String,
    pub password: String,
    pub email: String,
    pub last_name: String,
    pub first_name: String,
}

pub fn registration(input: RegisterInput) -> Result<Registration, ValidationErrors> {
    let mut rules = Rules::default();
    let login = rules.string("login", input.login, Some(50));
    let password = rules.secret("password", input.password, 255);
    let email = rules.email("email", input.email, 191);
    let last_name = rules.string("last_name", input.last_name, Some(50));
    let first_name = rules.string("first_name", input.first_name, Some(50));

    let registration = match (login, password, email, last_name, first_name) {
        (Some(login), Some(password), Some(email), Some(last_name), Some(first_name)) => {
            Some(Registration {
                login,
                password,
                email,
                last_name,
                first_name,
            })
        }
        _ => None,
    };
    rules.finish(registration)
}

/// `unique:users,login` and `unique:users,email`.
pub async fn unique_account(
    registration: &Registration,
    users: &dyn UserRepository,
) -> Result<(), AppError> {
    let mut rules = Rules::default();
    if users.login_taken(&registration.login).await? {
        rules.fail("login", "unique");
    }
    if users.email_taken(&registration.email).await? {
        rules.fail("email", "unique");
    }
    rules.finish(Some(())).map_err(AppError::InvalidData)
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

pub fn login(input: LoginInput) -> Result<Credentials, ValidationErrors> {
    let mut rules = Rules::default();
    let login = rules.string("login", input.login, Some(50));
    let password = rules.secret("password", input.password, 255);
    let credentials = match (login, password) {
        (Some(login), Some(password)) => Some(Credentials { login, password }),
        _ => None,
    };
    rules.finish(credentials)
}

/// Returns the accepted new password.
pub fn password(input: PasswordInput) -> Result<String, ValidationErrors> {
    let mut rules = Rules::default();
    let new_password = rules.secret("new_password", input.new_password, 255);
    let confirmation = rules.secret("password_confirmation", input.password_confirmation, 255);
    if let (Some(new_password), Some(confirmation)) = (&new_password, &confirmation) {
        if new_password != confirmation {
            rules.fail("password_confirmation", "same");
        }
    }
    rules.finish(new_password)
}

// --- Catalog ---

pub fn film(input: FilmInput) -> Result<NewFilm, ValidationErrors> {
    let mut rules = Rules::default();
    let title = rules.string("title", input.title, Some(50));
    let release_year = rules.year("release_year", input.release_year);
    let length = rules.integer("length", input.length, 0);
    let description = rules.string("description", input.description, None);
    let rating = rules.string("rating", input.rating, Some(5));
    let special_features = rules.string("special_features", input.special_features, Some(200));
    let image = rules.string("image", input.image, Some(40));
    let language_id = input.language_id;
    if language_id.is_none() {
        rules.fail("language_id", "required");
    }

    let film = match (
        title,
        release_year,
        length,
        description,
        rating,
        special_features,
        image,
        language_id,
    ) {
        (
            Some(title),
            Some(release_year),
            Some(length),
            Some(description),
            Some(rating),
            Some(special_features),
            Some(image),
            Some(language_id),
        ) => Some(NewFilm {
            title,
            release_year,
            length,
            description,
            rating,
            special_features,
            image,
            language_id,
        }),
        _ => None,
    };
    rules.finish(film)
}

/// `exists:languages,id`.
pub async fn language_exists(
    film: &NewFilm,
    languages: &dyn LanguageRepository,
) -> Result<(), AppError> {
    if languages.exists(film.language_id).await? {
        Ok(())
    } else {
        Err(AppError::InvalidData(ValidationErrors::single(
            "language_id",
            "exists",
        )))
    }
}

/// A critic body that passed the shape rules; the film and author come from
/// the request path and token.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub score: f64,
    pub comment: String,
}

pub fn critic(input: CriticInput) -> Result<Review, ValidationErrors> {
    let mut rules = Rules::default();
    let score = rules.number("score", input.score);
    let comment = rules.string("comment", input.comment, None);
    let review = match (score, comment) {
        (Some(score), Some(comment)) => Some(Review { score, comment }),
        _ => None,
    };
    rules.finish(review)
}

pub fn actor(input: ActorInput) -> Result<NewActor, ValidationErrors> {
    let mut rules = Rules::default();
    let first_name = rules.string("first_name", input.first_name, Some(50));
    let last_name = rules.string("last_name", input.last_name, Some(50));
    let actor = match (first_name, last_name) {
        (Some(first_name), Some(last_name)) => Some(NewActor {
            first_name,
            last_name,
        }),
        _ => None,
    };
    rules.finish(actor)
}
