//! Session Error Types
//!
//! One variant per failure kind of the session lifecycle. The variants
//! integrate with the unified `kernel::error::AppError` system at the
//! transport boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::TokenError;
use platform::rate_limit::RateLimitError;
use thiserror::Error;

/// Session-specific result type alias
pub type SessionResult<T> = Result<T, SessionError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Session lifecycle errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No record for the given token or id
    #[error("Session not found")]
    SessionNotFound,

    /// Record existed but failed an inactivity, lifespan or admin expiry check
    #[error("Session expired")]
    SessionExpired,

    /// Access (or refresh) token is past its TTL
    #[error("Token expired")]
    TokenExpired,

    /// Malformed or empty token, rejected before any lookup
    #[error("Invalid token")]
    InvalidToken,

    /// Too many session creations in the current window
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Per-user concurrent session cap reached
    #[error("Maximum active sessions reached")]
    MaxSessionsReached,

    /// Admin login with unknown username or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Store, crypto or timeout failure
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl SessionError {
    pub fn internal(message: impl Into<String>) -> Self {
        SessionError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SessionError::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for outcomes the caller should treat as "not authenticated"
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            SessionError::SessionNotFound
                | SessionError::SessionExpired
                | SessionError::TokenExpired
                | SessionError::InvalidCredentials
        )
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::SessionNotFound
            | SessionError::SessionExpired
            | SessionError::TokenExpired
            | SessionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            SessionError::InvalidToken => StatusCode::BAD_REQUEST,
            SessionError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            SessionError::MaxSessionsReached => StatusCode::CONFLICT,
            SessionError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SessionNotFound
            | SessionError::SessionExpired
            | SessionError::TokenExpired
            | SessionError::InvalidCredentials => ErrorKind::Unauthorized,
            SessionError::InvalidToken => ErrorKind::BadRequest,
            SessionError::RateLimitExceeded => ErrorKind::TooManyRequests,
            SessionError::MaxSessionsReached => ErrorKind::Conflict,
            SessionError::Internal { .. } => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError.
    ///
    /// Unauthenticated variants collapse into one generic message so callers
    /// cannot tell a missing session from an expired one. Internal details
    /// stay in the source.
    pub fn into_app_error(self) -> AppError {
        match self {
            SessionError::TokenExpired => AppError::unauthorized("Unauthorized")
                .with_action("Refresh the session and retry"),
            e if e.is_unauthenticated() => AppError::unauthorized("Unauthorized"),
            SessionError::Internal { source, .. } => {
                let err = AppError::internal("Internal error");
                match source {
                    Some(source) => err.with_boxed_source(source),
                    None => err,
                }
            }
            other => AppError::new(other.kind(), other.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            SessionError::Internal { message, source } => match source {
                Some(source) => {
                    tracing::error!(detail = %message, error = %source, "Session internal error")
                }
                None => tracing::error!(detail = %message, "Session internal error"),
            },
            SessionError::RateLimitExceeded => {
                tracing::warn!("Session creation rate limit exceeded");
            }
            SessionError::MaxSessionsReached => {
                tracing::warn!("Session creation rejected: per-user cap reached");
            }
            SessionError::InvalidCredentials => {
                tracing::warn!("Invalid admin login attempt");
            }
            _ => {
                tracing::debug!(error = %self, "Session error");
            }
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        self.log();
        self.into_app_error().into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        err.into_app_error()
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::internal_with("Session store error", err)
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        SessionError::internal_with("Token generation failed", err)
    }
}

impl From<RateLimitError> for SessionError {
    fn from(err: RateLimitError) -> Self {
        SessionError::internal_with("Rate limiter unavailable", err)
    }
}

impl From<tokio::time::error::Elapsed> for SessionError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        SessionError::internal_with("Session store call timed out", err)
    }
}
