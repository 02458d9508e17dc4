use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The closed RBAC enumeration. Stored as the Postgres enum `user_role`;
/// an unrecognized value in a row is a decode error surfaced at the repository
/// boundary, never a silent no-match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    #[default]
    #[serde(rename = "ROLE_USER")]
    #[sqlx(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    #[sqlx(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_MODERATOR")]
    #[sqlx(rename = "ROLE_MODERATOR")]
    Moderator,
}

/// PostStatus
///
/// The post lifecycle state. Exactly three distinct literals, stored as the
/// Postgres enum `post_status` whose declaration order (Pending, Verified,
/// Denied) doubles as the sort order for the `status_asc`/`status_desc` keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[sqlx(type_name = "post_status")]
pub enum PostStatus {
    #[default]
    #[serde(rename = "STATUS_PENDING")]
    #[sqlx(rename = "STATUS_PENDING")]
    Pending,
    #[serde(rename = "STATUS_VERIFIED")]
    #[sqlx(rename = "STATUS_VERIFIED")]
    Verified,
    #[serde(rename = "STATUS_DENIED")]
    #[sqlx(rename = "STATUS_DENIED")]
    Denied,
}

/// PostSort
///
/// Accepted values for the feed `sort` query parameter. Anything else falls
/// back to `Fallback` (status desc, date desc) rather than rejecting the
/// request, matching the tolerant behavior of the original API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    DateAsc,
    #[default]
    DateDesc,
    LikesAsc,
    LikesDesc,
    StatusAsc,
    StatusDesc,
    /// Default ordering of the `mine` feed: pending and denied posts first,
    /// newest first within a status. Not reachable from the wire `sort` key.
    OwnFeed,
    Fallback,
}

impl PostSort {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::DateDesc,
            Some("date_asc") => Self::DateAsc,
            Some("date_desc") => Self::DateDesc,
            Some("likes_asc") => Self::LikesAsc,
            Some("likes_desc") => Self::LikesDesc,
            Some("status_asc") => Self::StatusAsc,
            Some("status_desc") => Self::StatusDesc,
            Some(_) => Self::Fallback,
        }
    }

    /// The ORDER BY clause fragment for this sort key. Column names only, no
    /// user input is ever interpolated here.
    pub fn order_clause(self) -> &'static str {
        match self {
            Self::DateAsc => "p.date ASC",
            Self::DateDesc => "p.date DESC",
            Self::LikesAsc => "p.likes ASC",
            Self::LikesDesc => "p.likes DESC",
            Self::StatusAsc => "p.status ASC",
            Self::StatusDesc => "p.status DESC",
            Self::OwnFeed => "p.status ASC, p.date DESC",
            Self::Fallback => "p.status DESC, p.date DESC",
        }
    }
}

/// FeedFilter
///
/// Visibility modes for the feed. `Mine` shows the actor's own posts including
/// denied ones; `Moderation` shows the pending review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    Mine,
    Moderation,
}

impl FeedFilter {
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, ApiError> {
        match raw {
            None => Ok(None),
            Some("mine") => Ok(Some(Self::Mine)),
            Some("moderation") => Ok(Some(Self::Moderation)),
            Some(other) => Err(ApiError::BadRequest(format!(
                "Unknown feed filter '{}'",
                other
            ))),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Default object key used when a user has not uploaded a profile image.
pub const DEFAULT_USER_IMAGE: &str = "default-user-img.png";
/// Default object key used when a post has no attached image.
pub const DEFAULT_POST_IMAGE: &str = "default-post-img.png";

/// User
///
/// Canonical identity record from the `users` table. The password digest never
/// leaves the server: it is excluded from serialization entirely.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Object key of the profile image in the blob store.
    pub image_name: String,
    pub role: Role,
}

/// Post
///
/// A travel-journal entry from the `posts` table. `author` is populated by a
/// JOIN against `users` in every repository query that returns posts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// FK to users.id (owner). Immutable after creation.
    pub author_id: Uuid,
    /// Username of the owner, joined from `users`.
    pub author: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    /// Object key of the post image in the blob store.
    pub image_name: String,
    /// Denormalized like counter. Invariant: always equals the number of rows
    /// in `post_likes` for this post; both are mutated in one transaction.
    pub likes: i32,
    pub status: PostStatus,
}

// --- Request Payloads (Input Schemas) ---

/// SignUpRequest
///
/// Input for POST /auth/sign-up. The plaintext password is hashed immediately
/// and never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() {
            return Err(ApiError::BadRequest("Username must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(ApiError::BadRequest("Invalid email address".into()));
        }
        if self.password.len() < 8 {
            return Err(ApiError::BadRequest(
                "Password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

/// SignInRequest
///
/// Input for POST /auth/sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// ChangePasswordRequest
///
/// Input for PUT /users/password.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// UpdateProfileRequest
///
/// Partial update for the authenticated user's profile. The optional `image`
/// carries base64-encoded bytes which are pushed to the blob store; the
/// returned object key replaces the stored reference.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

/// ImagePayload
///
/// A client-supplied image: base64-encoded content plus its MIME type. The
/// server never interprets the bytes beyond decoding the base64 envelope.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ImagePayload {
    /// Base64-encoded file content.
    pub content: String,
    /// MIME type, e.g. "image/jpeg".
    pub content_type: String,
}

/// CreatePostRequest
///
/// Input for POST /posts. Field constraints mirror the journal rules:
/// title 3-100 chars, location non-empty and at most 100 chars, description
/// at most 2000 chars.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_title(&self.title)?;
        validate_location(&self.location)?;
        validate_description(self.description.as_deref())
    }
}

/// UpdatePostRequest
///
/// Partial update for PUT /posts/{id}. Only mutable fields appear here: the
/// status and author of a post can never be changed through an edit.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(location) = &self.location {
            validate_location(location)?;
        }
        validate_description(self.description.as_deref())
    }
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if !(3..=100).contains(&len) {
        return Err(ApiError::BadRequest(
            "Title must be between 3 and 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_location(location: &str) -> Result<(), ApiError> {
    let len = location.chars().count();
    if location.trim().is_empty() || len > 100 {
        return Err(ApiError::BadRequest(
            "Location must be non-empty and at most 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ApiError> {
    if let Some(d) = description {
        if d.chars().count() > 2000 {
            return Err(ApiError::BadRequest(
                "Description must be at most 2000 characters".into(),
            ));
        }
    }
    Ok(())
}

// --- Response Schemas (Output) ---

/// UserResponse
///
/// Full profile view for the authenticated user. `image` is a base64 data URL
/// resolved from the blob store, or None if the lookup degraded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub image: Option<String>,
}

/// SessionResponse
///
/// Minimal identity payload for session checks: who am I, what can I do.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionResponse {
    pub username: String,
    pub role: Role,
    pub image: Option<String>,
}

/// AuthResponse
///
/// Output of sign-up and sign-in: a signed session token plus the profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// PostResponse
///
/// The wire representation of a post. `image` is a base64 data URL; `is_liked`
/// reflects whether the requesting actor has liked the post and degrades to
/// false for anonymous viewers or failed enrichment lookups.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    /// Username of the post author.
    pub author: String,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub likes: i32,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
    pub status: PostStatus,
}

/// LikeResponse
///
/// Output of the like toggle: the post's new like count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LikeResponse {
    pub likes: i32,
}

/// PostPage
///
/// One page of the post feed, with the pagination bookkeeping the frontend
/// needs to render controls.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub content: Vec<PostResponse>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
    pub first: bool,
    pub last: bool,
}

impl PostPage {
    /// Assembles a page from its raw parts, computing the derived fields.
    /// `total_pages = ceil(total / size)`, `first = page == 0`,
    /// `last = page*size + size >= total`. The offset math saturates: the
    /// page index comes straight from the query string, and an absurdly large
    /// value must yield an empty last page, not an overflow.
    pub fn assemble(content: Vec<PostResponse>, page: i64, size: i64, total: i64) -> Self {
        let offset = page.saturating_mul(size);
        Self {
            page,
            size,
            total_elements: total,
            total_pages: (total + size - 1) / size,
            first: page == 0,
            last: offset.saturating_add(size) >= total,
            content,
        }
    }
}
