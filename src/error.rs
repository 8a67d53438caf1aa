//! Error types for the IronMQ client.

use http::StatusCode;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Text the service returns when a queue does not exist.
pub const QUEUE_NOT_FOUND_MESSAGE: &str = "404 Not Found: Queue not found";

/// Main error type for queue operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The service answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("name of queue is empty")]
    InvalidQueueName,

    #[error("didn't receive message ID for pushing message")]
    NoIdsReturned,

    #[error("message is not attached to a queue")]
    Detached,

    #[error("gave up polling subscribers after {attempts} attempts")]
    PollExhausted { attempts: u32 },
}

impl Error {
    /// HTTP status code if the service produced this error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Structured kind, for API errors only.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Whether the service reported a missing resource (404).
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    /// Whether the error reports a missing queue.
    ///
    /// A 404 whose message names the queue, as opposed to a missing message
    /// or subscriber. Equivalent to comparing the display text against
    /// [`QUEUE_NOT_FOUND_MESSAGE`].
    pub fn is_queue_not_found(&self) -> bool {
        match self {
            Error::Api(err) => {
                err.kind() == ErrorKind::NotFound
                    && err.message.to_ascii_lowercase().ends_with("queue not found")
            }
            _ => false,
        }
    }

    /// Whether the failure is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(err) => matches!(
                err.kind(),
                ErrorKind::ServiceUnavailable | ErrorKind::RateLimited
            ),
            Error::Network(_) | Error::Timeout => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

/// A non-success response from the service.
///
/// Displays as the combined status line and server message, for example
/// `404 Not Found: Queue not found`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Numeric HTTP status.
    pub status: u16,
    /// Status line, e.g. `404 Not Found`.
    pub status_line: String,
    /// Human-readable message.
    pub message: String,
}

/// Body shape the service uses for errors.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: String,
}

impl ApiError {
    /// Map a final response to an error.
    ///
    /// Returns `None` for 200 and 201. Otherwise the body is read as
    /// `{"msg": "..."}`; a body that does not decode yields the decode
    /// failure, and an empty `msg` yields "Unknown API Response".
    pub fn from_response(status: StatusCode, body: &[u8]) -> Option<Self> {
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return None;
        }

        let status_line = status_line(status);
        let message = match serde_json::from_slice::<ErrorBody>(body) {
            Err(err) => format!("{status_line}: {err}"),
            Ok(ErrorBody { msg }) if !msg.is_empty() => format!("{status_line}: {msg}"),
            Ok(_) => format!("{status_line}: Unknown API Response"),
        };

        Some(ApiError {
            status: status.as_u16(),
            status_line,
            message,
        })
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_status(self.status)
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Coarse classification of API errors by status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    RateLimited,
    ServiceUnavailable,
    Server,
    Other,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            406 => ErrorKind::NotAcceptable,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            503 => ErrorKind::ServiceUnavailable,
            _ if status >= 500 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    /// Canned explanation of what usually causes this kind of failure.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Unauthorized => Some("The OAuth token is either not provided or invalid"),
            ErrorKind::NotFound => {
                Some("The resource, project, or endpoint being requested doesn't exist.")
            }
            ErrorKind::MethodNotAllowed => Some("This endpoint doesn't support that particular verb"),
            ErrorKind::NotAcceptable => Some("Required fields are missing"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not found",
            ErrorKind::MethodNotAllowed => "method not allowed",
            ErrorKind::NotAcceptable => "not acceptable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::ServiceUnavailable => "service unavailable",
            ErrorKind::Server => "server error",
            ErrorKind::Other => "unexpected status",
        };
        f.write_str(name)
    }
}
