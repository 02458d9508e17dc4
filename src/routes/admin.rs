use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Admin Router Module
///
/// Nested under '/admin'. Routes exclusively for users with the admin role;
/// the role check is performed by the policy module inside each handler after
/// the request passes authentication.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/users/{username}/set-moderator
        // Grants the moderator role to an existing user. Moderation capability
        // is assigned by admins, never self-service.
        .route(
            "/users/{username}/set-moderator",
            put(handlers::set_moderator),
        )
}
