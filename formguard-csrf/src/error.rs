use formguard_core::Error as HttpError;
use formguard_session::SessionError;
use thiserror::Error;

/// Outcome of a failed guard operation.
///
/// `MissingToken`, `TokenMismatch` and `ExpiredSession` are rejections:
/// the submission must not be processed. They stay distinct here for logs
/// and tests but collapse into one generic HTTP error via
/// [`into_http_error`](CsrfError::into_http_error).
#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("Missing CSRF token")]
    MissingToken,

    #[error("CSRF token does not match the session token")]
    TokenMismatch,

    #[error("Session is missing or expired")]
    ExpiredSession,

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CsrfError {
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CsrfError::MissingToken | CsrfError::TokenMismatch | CsrfError::ExpiredSession
        )
    }

    /// Short tag for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            CsrfError::MissingToken => "missing_token",
            CsrfError::TokenMismatch => "token_mismatch",
            CsrfError::ExpiredSession => "expired_session",
            CsrfError::Session(_) => "session_store",
            CsrfError::Config(_) => "config",
        }
    }

    /// Map to the HTTP error surfaced to clients. Every rejection becomes
    /// the same `InvalidAuthenticityToken`; storage and configuration
    /// failures stay internal errors.
    pub fn into_http_error(self) -> HttpError {
        if self.is_rejection() {
            HttpError::InvalidAuthenticityToken(self.reason().to_string())
        } else {
            HttpError::Internal(self.to_string())
        }
    }
}

impl From<CsrfError> for HttpError {
    fn from(error: CsrfError) -> Self {
        error.into_http_error()
    }
}

pub type Result<T> = std::result::Result<T, CsrfError>;
