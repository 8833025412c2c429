/// Router Module Index
///
/// Routes are grouped by how much of the request pipeline they run through.
/// Each group applies its own layers before being merged into the `/api` router,
/// so a route can never end up outside its group's throttle or authentication.

/// Anonymous, unthrottled read-only routes.
pub mod public;

/// signup, signin and signout, sharing the auth throttle group.
pub mod session;

/// Bearer routes open to any signed-in user, gated per route by guards.
pub mod authenticated;

/// Bearer routes restricted to the "admin" role.
pub mod admin;
