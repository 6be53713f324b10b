// Error types for request handling

use thiserror::Error;

/// Generic message returned for every rejected authenticity token.
pub const INVALID_AUTHENTICITY_TOKEN: &str = "Invalid authenticity token";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A state-changing request failed CSRF verification. The payload is for
    /// server logs only; responses carry [`INVALID_AUTHENTICITY_TOKEN`].
    #[error("Invalid authenticity token: {0}")]
    InvalidAuthenticityToken(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Deserialization(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::InvalidAuthenticityToken(_) | Error::UnprocessableEntity(_) => 422,
            Error::Serialization(_) | Error::Internal(_) | Error::Io(_) => 500,
        }
    }

    /// Stable machine-readable identifier for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::MethodNotAllowed(_) => "method_not_allowed",
            Error::InvalidAuthenticityToken(_) => "invalid_authenticity_token",
            Error::UnprocessableEntity(_) => "unprocessable_entity",
            Error::Validation(_) => "validation",
            Error::Serialization(_) => "serialization",
            Error::Deserialization(_) => "deserialization",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidAuthenticityToken(_) => INVALID_AUTHENTICITY_TOKEN.to_string(),
            Error::Serialization(_) | Error::Internal(_) | Error::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_authenticity_error(&self) -> bool {
        matches!(self, Error::InvalidAuthenticityToken(_))
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
