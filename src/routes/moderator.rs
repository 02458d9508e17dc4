use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Moderator Router Module
///
/// Nested under '/moderator'. Holds the decision endpoint driving the post
/// lifecycle state machine. Authentication happens in the `AuthUser`
/// extractor; the moderator role requirement is enforced by the policy module
/// inside the handler.
pub fn moderator_routes() -> Router<AppState> {
    Router::new()
        // POST /moderator/posts/{id}/decision/{decision}
        // Applies 'approve' (Pending -> Verified) or 'reject'
        // (Pending -> Denied) to a pending post.
        .route(
            "/posts/{id}/decision/{decision}",
            post(handlers::decide_post),
        )
}
