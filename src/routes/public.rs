use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable by any client, anonymous or logged-in. Read handlers
/// here resolve an *optional* actor: anonymous viewers see only what the
/// visibility rules allow, while an attached bearer token lets authors and
/// admins see their own pending posts through the same endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/sign-up
        // Account registration. Uniqueness of username/email is enforced by
        // the database constraints; the handler maps violations to 400s.
        .route("/auth/sign-up", post(handlers::sign_up))
        // POST /auth/sign-in
        // Credential verification and token issuance.
        .route("/auth/sign-in", post(handlers::sign_in))
        // GET /posts?page=...&size=...&sort=...&filter=...
        // The paginated, filtered feed. Denied posts are excluded by default;
        // the `mine` and `moderation` filters require an authenticated actor.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/recommended
        // Top 5 non-denied posts by like count, then date.
        .route("/posts/recommended", get(handlers::recommended_posts))
        // GET /posts/{id}
        // Single post detail, gated by the visibility rule (pending posts are
        // author/admin only).
        .route("/posts/{id}", get(handlers::get_post))
}
