use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client. These are the identity gateway (login/register) and the static
/// mood catalog; everything that touches per-user data lives behind the
/// authenticated router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /login
        // Form-encoded credential exchange. On success the signed token is
        // returned in the body and mirrored into an HTTP-only cookie.
        .route("/login", post(handlers::login))
        // POST /register
        // New account creation: identity row plus credential row, committed
        // atomically. Duplicate usernames return 409.
        .route("/register", post(handlers::register))
        // GET /moods
        // The fixed mood catalog (levels 1-5) that daily entries reference.
        // Read-only and identical for every caller, hence public.
        .route("/moods", get(handlers::list_moods))
}
