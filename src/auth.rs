use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

// --- Password Hashing ---

/// Hashes a plaintext password with Argon2 and a fresh random salt. The
/// resulting PHC string is the only password material ever persisted.
pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            ApiError::Internal
        })
}

/// Verifies a plaintext password against a stored PHC digest. An unparsable
/// digest counts as a failed verification rather than an error: the caller
/// only ever learns pass/fail.
pub fn verify_password(plain: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("stored password digest is unparsable: {}", e);
            false
        }
    }
}

// --- Token Service ---

/// Claims
///
/// Payload of the signed session token. Stateless by design: there is no
/// revocation list, logout is client-side discard, and expiry is the embedded
/// issue time plus the configured TTL.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    /// The user's role at issue time. Re-resolved from the database on every
    /// request, so a role change invalidates stale claims naturally.
    pub role: Role,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued-at time (seconds since epoch).
    pub iat: usize,
}

/// TokenService
///
/// Issues and verifies HS256 session tokens. Wraps the signing secret so
/// handlers never touch key material directly.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_minutes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_minutes)
    }

    /// Issues a token for the given identity, valid for the configured TTL.
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!("token signing failed: {}", e);
            ApiError::Internal
        })
    }

    /// Verifies signature and expiry, returning the embedded claims. Every
    /// failure mode collapses to Unauthorized with a distinct message.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".into()),
            ErrorKind::InvalidSignature => ApiError::Unauthorized("Invalid token signature".into()),
            _ => ApiError::Unauthorized("Malformed token".into()),
        })
    }
}

// --- Actor Resolution ---

/// AuthUser
///
/// The resolved identity of an authenticated request. This is the single
/// actor value passed into every core operation; handlers never re-derive
/// identity from the token themselves.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// Resolves the actor from the Authorization header:
/// 1. Dev bypass: in `Env::Local`, an `x-user-id` header naming an existing
///    user authenticates directly (roles still loaded from the database).
/// 2. Bearer token extraction and signature/expiry verification.
/// 3. Database lookup, so a deleted user cannot ride a still-valid token.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local development bypass, guarded by the Env check.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = Uuid::parse_str(id_str) {
                        if let Ok(Some(user)) = repo.find_user_by_id(user_id).await {
                            return Ok(AuthUser {
                                id: user.id,
                                username: user.username,
                                role: user.role,
                            });
                        }
                    }
                }
            }
        }

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".into()))?;

        let claims = TokenService::from_config(&config).verify(token)?;

        // Final verification: the subject must still exist.
        let user = repo
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".into()))?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// OptionalAuthUser
///
/// Actor resolution for endpoints readable by anonymous clients (post detail,
/// feed). No Authorization header yields `None`; a header that is present but
/// invalid is still rejected, so clients cannot silently downgrade to an
/// anonymous view with a bad token.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let anonymous = !parts.headers.contains_key(header::AUTHORIZATION)
            && !parts.headers.contains_key("x-user-id");
        if anonymous {
            return Ok(Self(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|a| Self(Some(a)))
    }
}
