use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Post, PostStatus, Role},
};

/// Authorization Policy
///
/// Pure decision functions over (actor, resource) pairs, plus the post status
/// state machine. Handlers never compare roles or owner ids inline; every
/// access rule in the application lives here so it can be tested without a
/// database and audited in one place.

/// Moderation decision, parsed from the path segment of the moderator endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Parses a decision string case-insensitively. Anything other than
    /// "approve"/"reject" is a BadRequest, not an Unauthorized: the actor's
    /// permission is checked separately.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(ApiError::BadRequest(
                "Invalid decision. Must be either 'approve' or 'reject'".into(),
            )),
        }
    }
}

/// True iff the actor may take moderation decisions. Admins deliberately do
/// not moderate: the roles are disjoint capabilities.
pub fn can_moderate(actor: &AuthUser) -> bool {
    actor.role == Role::Moderator
}

/// True iff the actor owns the post or holds the admin role.
pub fn can_edit_or_delete(actor: &AuthUser, post: &Post) -> bool {
    actor.id == post.author_id || actor.role == Role::Admin
}

/// Visibility rule: a Pending post is invisible to everyone except its author
/// and admins. Verified and Denied posts are readable by anyone, including
/// anonymous viewers; feed-level exclusion of Denied posts is a separate
/// concern handled by the query layer.
pub fn can_view(actor: Option<&AuthUser>, post: &Post) -> bool {
    if post.status != PostStatus::Pending {
        return true;
    }
    match actor {
        Some(a) => a.id == post.author_id || a.role == Role::Admin,
        None => false,
    }
}

/// Applies a moderation decision to a post's status.
///
/// Valid transitions: Pending -> Verified on Approve, Pending -> Denied on
/// Reject. Deciding on a non-pending post is an invalid transition and fails
/// with BadRequest regardless of the decision.
pub fn apply_decision(status: PostStatus, decision: Decision) -> Result<PostStatus, ApiError> {
    if status != PostStatus::Pending {
        return Err(ApiError::BadRequest(
            "Can only make decisions on pending posts".into(),
        ));
    }
    Ok(match decision {
        Decision::Approve => PostStatus::Verified,
        Decision::Reject => PostStatus::Denied,
    })
}

/// Applies the resubmission transition: Denied -> Pending. Resubmitting a
/// post in any other state is an invalid transition.
pub fn apply_resubmit(status: PostStatus) -> Result<PostStatus, ApiError> {
    if status != PostStatus::Denied {
        return Err(ApiError::BadRequest(
            "Only denied posts can be resubmitted".into(),
        ));
    }
    Ok(PostStatus::Pending)
}

/// Convenience wrapper used by handlers: ownership-or-admin check that raises
/// the canonical Unauthorized failure when it does not hold.
pub fn require_edit_or_delete(actor: &AuthUser, post: &Post, action: &str) -> Result<(), ApiError> {
    if can_edit_or_delete(actor, post) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(format!(
            "You are not authorized to {} this post",
            action
        )))
    }
}

/// Moderator-role gate raising the canonical Unauthorized failure.
pub fn require_moderator(actor: &AuthUser) -> Result<(), ApiError> {
    if can_moderate(actor) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(
            "Only moderators can make decisions on posts".into(),
        ))
    }
}

/// Admin-role gate raising the canonical Unauthorized failure.
pub fn require_admin(actor: &AuthUser) -> Result<(), ApiError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(
            "Only administrators can perform this action".into(),
        ))
    }
}

/// Visibility gate raising the canonical Unauthorized failure.
pub fn require_view(actor: Option<&AuthUser>, post: &Post) -> Result<(), ApiError> {
    if can_view(actor, post) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(
            "You are not authorized to view this post".into(),
        ))
    }
}
