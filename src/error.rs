use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The single failure taxonomy for the whole application. Every handler and
/// service returns `Result<T, ApiError>`, and the `IntoResponse` impl below is
/// the only place where failures are turned into HTTP responses.
///
/// Domain-rule violations (authorization, state machine, validation) carry a
/// human-readable message and propagate unmodified to the boundary. Collaborator
/// failures (database, storage) are wrapped into `Internal`/`StorageUnavailable`
/// so raw driver errors never leak to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input, invalid state transition, or invalid decision string.
    #[error("{0}")]
    BadRequest(String),

    /// Uniqueness violation on the username column.
    #[error("User with this username already exists")]
    DuplicateUsername,

    /// Uniqueness violation on the email column.
    #[error("User with this email already exists")]
    DuplicateEmail,

    /// Missing/invalid token, insufficient role, or ownership violation.
    #[error("{0}")]
    Unauthorized(String),

    /// Missing user or post.
    #[error("{0}")]
    NotFound(String),

    /// The blob store rejected or failed an upload/download.
    #[error("Storage service unavailable")]
    StorageUnavailable,

    /// Unclassified store or infrastructure failure. The source is logged at
    /// the point of wrapping; the client only ever sees a generic message.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Wraps an unclassified database error, logging the cause before it is
    /// discarded from the client-visible path.
    pub fn from_db(err: sqlx::Error) -> Self {
        tracing::error!("database error: {:?}", err);
        Self::Internal
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::DuplicateUsername | Self::DuplicateEmail => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    /// Maps every failure to its stable status class with a `{"errors": [...]}`
    /// JSON body. `Internal` deliberately renders a fixed message only.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "errors": [self.to_string()] }));
        (status, body).into_response()
    }
}
