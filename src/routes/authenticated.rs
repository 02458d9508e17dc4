use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any user who has passed the authentication layer: profile
/// management, post submission and editing, resubmission, and likes.
///
/// Access Control Strategy:
/// Every handler here receives a validated `AuthUser` from the extractor
/// middleware layered above this module. Ownership and role rules are then
/// applied through the policy module, never inline.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/session
        // Minimal identity payload for the frontend session bootstrap.
        .route("/users/session", get(handlers::check_session))
        // GET/PUT /users/profile
        // Full profile view and partial update (email, image).
        .route(
            "/users/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // PUT /users/password
        // Password rotation; the old password must verify first.
        .route("/users/password", put(handlers::change_password))
        // POST /users/image/reset
        // Restores the sentinel profile image.
        .route("/users/image/reset", post(handlers::reset_profile_image))
        // --- Posts ---
        // POST /posts
        // Submits a new journal entry; it enters the moderation queue Pending.
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Edit or remove a post. The author-or-admin rule is enforced via the
        // policy module inside the handlers.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // PUT /posts/{id}/resubmit
        // Sends a denied post back into the moderation queue.
        .route("/posts/{id}/resubmit", put(handlers::resubmit_post))
        // POST /posts/{id}/image/reset
        // Restores the sentinel post image.
        .route("/posts/{id}/image/reset", post(handlers::reset_post_image))
        // POST /posts/{id}/like
        // Idempotent like toggle; returns the new like count.
        .route("/posts/{id}/like", post(handlers::toggle_like))
}

