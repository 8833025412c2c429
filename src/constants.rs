//! Shared constants
//!
//! Role identifiers, throttle defaults, page size and every message string the
//! API puts on the wire. Handlers, guards and the error mapper all read from here.

/// Page size used when a listing is requested with `?page=`.
pub const SEARCH_PAGINATION: u32 = 20;

// Roles (ids match the seed rows in the initial migration).
pub const ROLE_USER_ID: i64 = 1;
pub const ROLE_ADMIN_ID: i64 = 2;
pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

// Throttle defaults, requests per minute.
pub const AUTH_THROTTLE: u32 = 5;
pub const DEFAULT_THROTTLE: u32 = 60;

// Token issued at sign-in.
pub const TOKEN_NAME: &str = "AuthToken";
pub const TOKEN_SECRET_LENGTH: usize = 40;

// JSON messages
pub const CREATED_MSG: &str = "Created";
pub const UPDATED_MSG: &str = "Updated";
pub const TOO_MANY_ATTEMPTS_MSG: &str = "Too Many Attempts.";
pub const FORBIDDEN_MSG: &str = "Forbidden";
pub const UNAUTHENTICATED_MSG: &str = "Unauthenticated.";
pub const NOT_FOUND_MSG: &str = "Not found";
pub const INVALID_DATA_MSG: &str = "Invalid data";
pub const SERVER_ERROR_MSG: &str = "Server error";
pub const USER_LOGIN_FAILED_MSG: &str = "Failed to log in";
