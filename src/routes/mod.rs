/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// Access control is applied explicitly at the module level (via Axum layers
/// and extractors), preventing accidental exposure of protected endpoints.

/// Routes accessible without authentication: sign-up/sign-in and the
/// visibility-filtered read surface (feed, recommended, post detail). Read
/// handlers accept an optional actor so authors and admins can see their own
/// pending posts.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated user session.
pub mod authenticated;

/// Routes for moderation decisions. The moderator role check happens in the
/// handler, after authentication.
pub mod moderator;

/// Routes restricted to users with the admin role.
pub mod admin;
