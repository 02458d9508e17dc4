use crate::{
    AppState,
    auth::{self, AuthUser, OptionalAuthUser, TokenService},
    error::ApiError,
    models::{
        AuthResponse, ChangePasswordRequest, CreatePostRequest, DEFAULT_POST_IMAGE,
        DEFAULT_USER_IMAGE, FeedFilter, ImagePayload, LikeResponse, Post, PostPage, PostResponse,
        PostSort, Role, SessionResponse, SignInRequest, SignUpRequest, UpdatePostRequest,
        UpdateProfileRequest, UserResponse,
    },
    policy,
    repository::{FeedQuery, NewPost, PostPatch},
    storage,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::NaiveDate;
use serde::Deserialize;

// --- Filter Structs ---

/// FeedParams
///
/// Query parameters accepted by the feed endpoint (GET /posts). Bound safely
/// by Axum's Query extractor; `sort` and `filter` are free strings here and
/// parsed into their closed enums inside the handler.
#[derive(Deserialize, utoipa::IntoParams, Default)]
pub struct FeedParams {
    /// Zero-based page index.
    pub page: Option<i64>,
    /// Page size, clamped to [1, 100].
    pub size: Option<i64>,
    /// Sort key; unknown values fall back to status desc, date desc.
    pub sort: Option<String>,
    /// Feed mode: "mine" or "moderation".
    pub filter: Option<String>,
    /// Case-insensitive author username substring.
    pub author: Option<String>,
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Case-insensitive location substring.
    pub location: Option<String>,
    /// Inclusive start of the date range (YYYY-MM-DD).
    pub start_date: Option<NaiveDate>,
    /// Inclusive end of the date range (YYYY-MM-DD).
    pub end_date: Option<NaiveDate>,
}

// --- Shared Helpers ---

/// Decodes a client image payload and stores it, returning the new object
/// reference. A data-URL prefix is tolerated and stripped.
async fn store_image(state: &AppState, payload: &ImagePayload) -> Result<String, ApiError> {
    let raw = match payload.content.find("base64,") {
        Some(idx) => &payload.content[idx + "base64,".len()..],
        None => payload.content.as_str(),
    };
    let bytes = BASE64
        .decode(raw)
        .map_err(|_| ApiError::BadRequest("Image content is not valid base64".into()))?;
    state.storage.put(bytes, &payload.content_type).await
}

/// Best-effort image rendering for responses. Failures are logged and degrade
/// to None; an image that cannot be fetched must never abort the response.
async fn image_data_url(state: &AppState, reference: &str) -> Option<String> {
    match storage::get_as_data_url(&state.storage, reference).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("image lookup degraded for '{}': {}", reference, e);
            None
        }
    }
}

/// Builds the wire representation of a post for the given viewer. The
/// `is_liked` lookup is enrichment-only: on failure it is logged and defaults
/// to false rather than failing the response.
async fn post_response(state: &AppState, post: Post, actor: Option<&AuthUser>) -> PostResponse {
    let is_liked = match actor {
        Some(a) => match state.repo.is_liked(a.id, post.id).await {
            Ok(liked) => liked,
            Err(e) => {
                tracing::warn!("like-status lookup degraded for post {}: {}", post.id, e);
                false
            }
        },
        None => false,
    };

    PostResponse {
        image: image_data_url(state, &post.image_name).await,
        id: post.id,
        title: post.title,
        author: post.author,
        date: post.date,
        location: post.location,
        description: post.description,
        likes: post.likes,
        is_liked,
        status: post.status,
    }
}

/// Loads a post or fails with the canonical NotFound message.
async fn require_post(state: &AppState, id: i64) -> Result<Post, ApiError> {
    state
        .repo
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))
}

// --- Auth Handlers ---

/// sign_up
///
/// [Public Route] Registers a new account. Username and email uniqueness is
/// pre-checked here as an optimization, but the database constraints are the
/// authoritative check; a store-level violation still maps to the same
/// Duplicate failure. Only the Argon2 digest is persisted.
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or duplicate username/email")
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate()?;

    // Best-effort pre-check; race-prone by nature, the insert below decides.
    if state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateUsername);
    }

    let digest = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(&payload.username, &payload.email, &digest)
        .await?;

    let token = TokenService::from_config(&state.config).issue(user.id, user.role)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            image: image_data_url(&state, &user.image_name).await,
            username: user.username,
            email: user.email,
        },
    }))
}

/// sign_in
///
/// [Public Route] Verifies credentials and issues a session token. The same
/// Unauthorized message covers unknown usernames and wrong passwords, so the
/// endpoint does not leak which accounts exist.
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .filter(|u| auth::verify_password(&payload.password, &u.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".into()))?;

    let token = TokenService::from_config(&state.config).issue(user.id, user.role)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            image: image_data_url(&state, &user.image_name).await,
            username: user.username,
            email: user.email,
        },
    }))
}

// --- User Handlers ---

/// check_session
///
/// [Authenticated Route] Minimal identity payload for the frontend's session
/// bootstrap: username, role, and profile image.
#[utoipa::path(
    get,
    path = "/users/session",
    responses((status = 200, description = "Session", body = SessionResponse))
)]
pub async fn check_session(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(SessionResponse {
        image: image_data_url(&state, &user.image_name).await,
        username: user.username,
        role: user.role,
    }))
}

/// get_profile
///
/// [Authenticated Route] Full profile view for the requesting user.
#[utoipa::path(
    get,
    path = "/users/profile",
    responses((status = 200, description = "Profile", body = UserResponse))
)]
pub async fn get_profile(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(UserResponse {
        image: image_data_url(&state, &user.image_name).await,
        username: user.username,
        email: user.email,
    }))
}

/// update_profile
///
/// [Authenticated Route] Changes the actor's email and/or profile image.
/// Email uniqueness is re-validated: a store-level violation maps to
/// DuplicateEmail.
#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 400, description = "Duplicate email")
    )
)]
pub async fn update_profile(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut user = state
        .repo
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Some(email) = &payload.email {
        if *email != user.email {
            user = state.repo.update_email(actor.id, email).await?;
        }
    }

    if let Some(image) = &payload.image {
        let reference = store_image(&state, image).await?;
        state.repo.update_user_image(actor.id, &reference).await?;
        user.image_name = reference;
    }

    Ok(Json(UserResponse {
        image: image_data_url(&state, &user.image_name).await,
        username: user.username,
        email: user.email,
    }))
}

/// change_password
///
/// [Authenticated Route] Rotates the actor's password. The old password must
/// verify against the stored digest, and the new one must differ from it.
#[utoipa::path(
    put,
    path = "/users/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password equals old"),
        (status = 401, description = "Old password does not verify")
    )
)]
pub async fn change_password(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = state
        .repo
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !auth::verify_password(&payload.old_password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid current password".into()));
    }
    if payload.new_password == payload.old_password {
        return Err(ApiError::BadRequest(
            "New password must be different from current password".into(),
        ));
    }

    let digest = auth::hash_password(&payload.new_password)?;
    state.repo.update_password(actor.id, &digest).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// reset_profile_image
///
/// [Authenticated Route] Restores the sentinel profile image.
#[utoipa::path(
    post,
    path = "/users/image/reset",
    responses((status = 204, description = "Image reset"))
)]
pub async fn reset_profile_image(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .repo
        .update_user_image(actor.id, DEFAULT_USER_IMAGE)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Post Handlers ---

/// create_post
///
/// [Authenticated Route] Submits a new journal entry. Validation failures are
/// BadRequest; the post starts Pending with zero likes, and the image is the
/// sentinel unless a blob was supplied.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostResponse),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn create_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    payload.validate()?;

    let image_name = match &payload.image {
        Some(image) => store_image(&state, image).await?,
        None => DEFAULT_POST_IMAGE.to_string(),
    };

    let post = state
        .repo
        .create_post(NewPost {
            author_id: actor.id,
            title: payload.title,
            location: payload.location,
            description: payload.description,
            image_name,
        })
        .await?;

    let response = post_response(&state, post, Some(&actor)).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// get_post
///
/// [Public Route, optional auth] Retrieves a single post. Pending posts are
/// visible only to their author and admins; everyone else gets Unauthorized.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostResponse),
        (status = 401, description = "Post pending review and viewer is not author/admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    OptionalAuthUser(actor): OptionalAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = require_post(&state, id).await?;
    policy::require_view(actor.as_ref(), &post)?;
    Ok(Json(post_response(&state, post, actor.as_ref()).await))
}

/// update_post
///
/// [Authenticated Route] Edits a post's mutable fields (title, location,
/// description, image). Author or admin only; status and author are never
/// touched through this path.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostResponse),
        (status = 401, description = "Not author or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    payload.validate()?;

    let post = require_post(&state, id).await?;
    policy::require_edit_or_delete(&actor, &post, "edit")?;

    let image_name = match &payload.image {
        Some(image) => Some(store_image(&state, image).await?),
        None => None,
    };

    let updated = state
        .repo
        .update_post(
            id,
            PostPatch {
                title: payload.title,
                location: payload.location,
                description: payload.description,
                image_name,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    Ok(Json(post_response(&state, updated, Some(&actor)).await))
}

/// delete_post
///
/// [Authenticated Route] Removes a post and its like relations atomically.
/// Author or admin only.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not author or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = require_post(&state, id).await?;
    policy::require_edit_or_delete(&actor, &post, "delete")?;

    state.repo.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// resubmit_post
///
/// [Authenticated Route] Sends a denied post back into the moderation queue
/// (Denied -> Pending). Author or admin only; any other starting status is an
/// invalid transition.
#[utoipa::path(
    put,
    path = "/posts/{id}/resubmit",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Resubmitted"),
        (status = 400, description = "Post is not denied"),
        (status = 401, description = "Not author or admin")
    )
)]
pub async fn resubmit_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = require_post(&state, id).await?;
    policy::require_edit_or_delete(&actor, &post, "resubmit")?;

    let next = policy::apply_resubmit(post.status)?;
    state.repo.set_post_status(id, next).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// reset_post_image
///
/// [Authenticated Route] Restores the sentinel post image. Author or admin only.
#[utoipa::path(
    post,
    path = "/posts/{id}/image/reset",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Image reset"),
        (status = 401, description = "Not author or admin")
    )
)]
pub async fn reset_post_image(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = require_post(&state, id).await?;
    policy::require_edit_or_delete(&actor, &post, "reset the image of")?;

    state.repo.set_post_image(id, DEFAULT_POST_IMAGE).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// toggle_like
///
/// [Authenticated Route] Idempotent like flip: a second toggle undoes the
/// first. Counter and membership move in one transaction in the repository,
/// and the viewer must be allowed to see the post to like it.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "New like count", body = LikeResponse),
        (status = 401, description = "Post not visible to actor"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn toggle_like(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
    let post = require_post(&state, id).await?;
    policy::require_view(Some(&actor), &post)?;

    let likes = state.repo.toggle_like(actor.id, id).await?;
    Ok(Json(LikeResponse { likes }))
}

/// list_posts
///
/// [Public Route, optional auth] The paginated feed. Default mode hides
/// denied posts; `filter=mine` shows only the actor's posts including denied
/// ones; `filter=moderation` is the pending queue, restricted to moderators.
#[utoipa::path(
    get,
    path = "/posts",
    params(FeedParams),
    responses(
        (status = 200, description = "Page of posts", body = PostPage),
        (status = 400, description = "Unknown filter"),
        (status = 401, description = "Filter requires authentication/role")
    )
)]
pub async fn list_posts(
    OptionalAuthUser(actor): OptionalAuthUser,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<PostPage>, ApiError> {
    let filter = FeedFilter::parse(params.filter.as_deref())?;

    let viewer_id = match filter {
        Some(FeedFilter::Mine) => Some(
            actor
                .as_ref()
                .ok_or_else(|| ApiError::Unauthorized("User not authenticated".into()))?
                .id,
        ),
        Some(FeedFilter::Moderation) => {
            let a = actor
                .as_ref()
                .ok_or_else(|| ApiError::Unauthorized("User not authenticated".into()))?;
            policy::require_moderator(a)?;
            None
        }
        None => None,
    };

    let sort = match (filter, params.sort.as_deref()) {
        // A `mine` feed without an explicit sort surfaces posts needing
        // attention first.
        (Some(FeedFilter::Mine), None) => PostSort::OwnFeed,
        (_, raw) => PostSort::parse(raw),
    };

    let page = params.page.unwrap_or(0).max(0);
    let size = params.size.unwrap_or(10).clamp(1, 100);

    let query = FeedQuery {
        filter,
        viewer_id,
        author: params.author,
        title: params.title,
        location: params.location,
        start_date: params
            .start_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        end_date: params
            .end_date
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc()),
        sort,
        page,
        size,
    };

    let (posts, total) = state.repo.list_posts(&query).await?;

    let mut content = Vec::with_capacity(posts.len());
    for post in posts {
        content.push(post_response(&state, post, actor.as_ref()).await);
    }

    Ok(Json(PostPage::assemble(content, page, size, total)))
}

/// recommended_posts
///
/// [Public Route, optional auth] Top 5 non-denied posts by likes then date.
/// Rendered as a fixed single page.
#[utoipa::path(
    get,
    path = "/posts/recommended",
    responses((status = 200, description = "Recommended posts", body = PostPage))
)]
pub async fn recommended_posts(
    OptionalAuthUser(actor): OptionalAuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostPage>, ApiError> {
    let posts = state.repo.recommended_posts(5).await?;

    let mut content = Vec::with_capacity(posts.len());
    for post in posts {
        content.push(post_response(&state, post, actor.as_ref()).await);
    }

    let total = content.len() as i64;
    Ok(Json(PostPage {
        content,
        page: 0,
        size: 5,
        total_elements: total,
        total_pages: 1,
        first: true,
        last: true,
    }))
}

// --- Moderation Handlers ---

/// decide_post
///
/// [Moderator Route] Applies a moderation decision to a pending post:
/// `approve` -> Verified, `reject` -> Denied. Any other decision string is a
/// BadRequest; non-moderators are Unauthorized; deciding on a non-pending
/// post is an invalid transition.
#[utoipa::path(
    post,
    path = "/moderator/posts/{id}/decision/{decision}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("decision" = String, Path, description = "approve or reject")
    ),
    responses(
        (status = 204, description = "Decision applied"),
        (status = 400, description = "Invalid decision or post not pending"),
        (status = 401, description = "Not a moderator"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn decide_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path((id, decision)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    policy::require_moderator(&actor)?;

    let decision = policy::Decision::parse(&decision)?;
    let post = require_post(&state, id).await?;
    let next = policy::apply_decision(post.status, decision)?;

    state.repo.set_post_status(id, next).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

/// set_moderator
///
/// [Admin Route] Grants the moderator role to the named user.
#[utoipa::path(
    put,
    path = "/admin/users/{username}/set-moderator",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Role granted"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_moderator(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    policy::require_admin(&actor)?;

    if state.repo.set_role(&username, Role::Moderator).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("User not found".into()))
    }
}
