//! Error types for thinkstream.
//!
//! Everything that can end a request early is an [`Error`].  Per-frame decoding problems are not
//! errors in this sense; they are reported as [`crate::MalformedFrame`] values and never
//! propagate with `?`.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for thinkstream.
#[derive(Clone, Debug)]
pub enum Error {
    /// The endpoint answered with a non-success status we have no better variant for.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error type string reported by the endpoint.
        error_type: Option<String>,
        /// Message from the endpoint, or the status reason.
        message: String,
    },

    /// The bearer token was missing or rejected.
    Authentication { message: String },

    /// The token is valid but may not use the requested resource.
    Permission { message: String },

    /// Unknown model or endpoint path.
    NotFound { message: String },

    /// Rate limit exceeded.
    RateLimit {
        /// Message from the endpoint.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// The endpoint rejected the request body.
    BadRequest { message: String },

    /// The request did not complete in time.
    Timeout {
        /// What went wrong.
        message: String,
        /// Configured timeout in seconds.
        duration: Option<f64>,
    },

    /// The user interrupted the exchange.
    Interrupted { message: String },

    /// Could not connect to the endpoint.
    Connection {
        /// What went wrong.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The endpoint returned a 500.
    InternalServer { message: String },

    /// The endpoint is overloaded or unavailable.
    ServiceUnavailable {
        /// Message from the endpoint.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// JSON or YAML serialization failed.
    Serialization {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// The HTTP client could not be built or used.
    HttpClient {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A configuration or request value is out of range.
    Validation {
        /// Description of the failure.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL could not be parsed.
    Url {
        message: String,
        source: Option<url::ParseError>,
    },

    /// The response body failed while it was being read.
    Transport {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The configuration file could not be read or parsed.
    Config {
        /// What went wrong, naming the file.
        message: String,
        /// The underlying I/O or YAML error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new interrupted error.
    pub fn interrupted(message: impl Into<String>) -> Self {
        Error::Interrupted {
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new configuration error.
    pub fn config(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Config {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if the response body failed mid-stream.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Returns true if the user interrupted the exchange.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 409 | 429 | 500..=599)
            }
            Error::Timeout { .. }
            | Error::Connection { .. }
            | Error::RateLimit { .. }
            | Error::ServiceUnavailable { .. }
            | Error::InternalServer { .. }
            | Error::Transport { .. } => true,
            _ => false,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::Authentication { .. } => Some(401),
            Error::Permission { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::RateLimit { .. } => Some(429),
            Error::InternalServer { .. } => Some(500),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_type,
                message,
            } => match error_type {
                Some(error_type) => write!(f, "{error_type} ({status_code}): {message}"),
                None => write!(f, "API error ({status_code}): {message}"),
            },
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission error: {message}"),
            Error::NotFound { message } => write!(f, "Not found: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => match retry_after {
                Some(secs) => write!(
                    f,
                    "Rate limit exceeded: {message} (retry after {secs} seconds)"
                ),
                None => write!(f, "Rate limit exceeded: {message}"),
            },
            Error::BadRequest { message } => write!(f, "Bad request: {message}"),
            Error::Timeout { message, duration } => match duration {
                Some(duration) => write!(f, "Timeout error: {message} ({duration} seconds)"),
                None => write!(f, "Timeout error: {message}"),
            },
            Error::Interrupted { message } => write!(f, "Interrupted: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer { message } => write!(f, "Internal server error: {message}"),
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => match retry_after {
                Some(secs) => write!(
                    f,
                    "Service unavailable: {message} (retry after {secs} seconds)"
                ),
                None => write!(f, "Service unavailable: {message}"),
            },
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Validation { message, param } => match param {
                Some(param) => write!(f, "Validation error: {message} (parameter: {param})"),
                None => write!(f, "Validation error: {message}"),
            },
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Transport { message, .. } => write!(f, "Transport failure: {message}"),
            Error::Config { message, .. } => write!(f, "Configuration error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Transport { source, .. }
            | Error::Config { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::timeout(format!("Request timed out: {err}"), None)
        } else if err.is_connect() {
            Error::connection(format!("Connection error: {err}"), Some(Box::new(err)))
        } else if err.is_body() || err.is_decode() {
            Error::transport(format!("Error in HTTP stream: {err}"), Some(Box::new(err)))
        } else {
            Error::http_client(format!("Request failed: {err}"), Some(Box::new(err)))
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for thinkstream operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_errors_are_distinct_from_interrupts() {
        let err = Error::transport("connection reset", None);
        assert!(err.is_transport());
        assert!(!err.is_interrupted());
        assert!(err.is_retryable());

        let err = Error::interrupted("user pressed ctrl-c");
        assert!(err.is_interrupted());
        assert!(!err.is_transport());
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = Error::rate_limit("slow down", Some(30));
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded: slow down (retry after 30 seconds)"
        );
        let err = Error::api(418, Some("teapot".to_string()), "short and stout");
        assert_eq!(err.to_string(), "teapot (418): short and stout");
        assert_eq!(err.status_code(), Some(418));
    }

    #[test]
    fn json_errors_keep_their_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn url_errors_convert() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.to_string().starts_with("URL error"));
    }
}
