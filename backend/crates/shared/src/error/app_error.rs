//! Application Error
//!
//! [`AppError`] is what crosses the transport boundary: a kind, a message
//! that is safe to show, an optional next step for the caller, and the
//! underlying cause for logs.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::kind::ErrorKind;

type Source = Box<dyn Error + Send + Sync + 'static>;

/// ```rust
/// use kernel::error::app_error::AppError;
///
/// let err = AppError::unauthorized("Unauthorized")
///     .with_action("Refresh the session and retry");
/// assert_eq!(err.status_code(), 401);
/// assert_eq!(err.action(), Some("Refresh the session and retry"));
/// ```
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    action: Option<Cow<'static, str>>,
    source: Option<Source>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            source: None,
        }
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    pub fn with_action(mut self, action: impl Into<Cow<'static, str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attach an already boxed cause; never shown to the caller
    pub fn with_boxed_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("action", &self.action)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_with_action() {
        let err = AppError::unauthorized("Unauthorized").with_action("Refresh and retry");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Unauthorized");
        assert_eq!(err.action(), Some("Refresh and retry"));
        assert_eq!(err.to_string(), "Unauthorized: Unauthorized");
    }

    #[test]
    fn test_source_is_kept_out_of_display() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "store timed out");
        let err = AppError::internal("Internal error").with_boxed_source(Box::new(cause));
        assert!(err.source().is_some());
        assert!(!err.to_string().contains("store timed out"));
        assert!(format!("{err:?}").contains("store timed out"));
    }
}
