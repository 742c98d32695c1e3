//! Text generation error types with fallback classification.
//!
//! Distinguishes between errors that should move on to the next model and errors that
//! no other model would fix.

use crate::error::BoardError;

/// Error from a text generation call.
#[derive(Debug, Clone)]
pub struct TextGenError {
    /// The kind of error
    pub kind: TextGenErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl TextGenError {
    pub fn rate_limited(message: String) -> Self {
        Self {
            kind: TextGenErrorKind::RateLimited,
            status_code: Some(429),
            message,
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: TextGenErrorKind::ServerError,
            status_code: Some(status_code),
            message,
        }
    }

    /// Bad request, auth, unknown model.
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: TextGenErrorKind::ClientError,
            status_code: Some(status_code),
            message,
        }
    }

    pub fn network_error(message: String) -> Self {
        Self {
            kind: TextGenErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// The model answered but the answer could not be used.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: TextGenErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    /// No key configured, or every model failed.
    pub fn unavailable(message: String) -> Self {
        Self {
            kind: TextGenErrorKind::Unavailable,
            status_code: None,
            message,
        }
    }

    /// Check if this error is transient.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Check if the next model in the fallback list should be tried.
    pub fn should_fallback(&self) -> bool {
        self.kind.should_fallback()
    }
}

impl std::fmt::Display for TextGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for TextGenError {}

impl From<TextGenError> for BoardError {
    fn from(e: TextGenError) -> Self {
        match e.kind {
            TextGenErrorKind::ParseError => BoardError::MalformedInput(e.to_string()),
            _ => BoardError::PersistenceFailure(e.to_string()),
        }
    }
}

/// Classification of text generation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextGenErrorKind {
    /// Rate limited (429)
    RateLimited,
    /// Server error (5xx)
    ServerError,
    /// Client error (4xx other than 429)
    ClientError,
    /// Connection failed or timed out
    NetworkError,
    /// Response body or model output unusable
    ParseError,
    /// Nothing left to try
    Unavailable,
}

impl TextGenErrorKind {
    /// Check if this error kind is transient (might succeed if asked again later).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TextGenErrorKind::RateLimited
                | TextGenErrorKind::ServerError
                | TextGenErrorKind::NetworkError
        )
    }

    /// Any failed HTTP exchange moves on to the next model.
    pub fn should_fallback(&self) -> bool {
        matches!(
            self,
            TextGenErrorKind::RateLimited
                | TextGenErrorKind::ServerError
                | TextGenErrorKind::ClientError
                | TextGenErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for TextGenErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextGenErrorKind::RateLimited => write!(f, "Rate limited"),
            TextGenErrorKind::ServerError => write!(f, "Server error"),
            TextGenErrorKind::ClientError => write!(f, "Client error"),
            TextGenErrorKind::NetworkError => write!(f, "Network error"),
            TextGenErrorKind::ParseError => write!(f, "Parse error"),
            TextGenErrorKind::Unavailable => write!(f, "Text generation unavailable"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> TextGenErrorKind {
    match status {
        429 => TextGenErrorKind::RateLimited,
        500 | 502 | 503 | 504 => TextGenErrorKind::ServerError,
        400..=499 => TextGenErrorKind::ClientError,
        _ => TextGenErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TextGenErrorKind::RateLimited.is_transient());
        assert!(TextGenErrorKind::ServerError.is_transient());
        assert!(TextGenErrorKind::NetworkError.is_transient());
        assert!(!TextGenErrorKind::ClientError.is_transient());
        assert!(!TextGenErrorKind::ParseError.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), TextGenErrorKind::RateLimited);
        assert_eq!(classify_http_status(503), TextGenErrorKind::ServerError);
        assert_eq!(classify_http_status(401), TextGenErrorKind::ClientError);
        assert_eq!(classify_http_status(302), TextGenErrorKind::ServerError);
    }

    #[test]
    fn test_parse_errors_become_malformed_input() {
        let err: BoardError = TextGenError::parse_error("no JSON".to_string()).into();
        assert!(matches!(err, BoardError::MalformedInput(_)));

        let err: BoardError = TextGenError::unavailable("no key".to_string()).into();
        assert!(matches!(err, BoardError::PersistenceFailure(_)));
    }
}
