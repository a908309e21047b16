use std::fmt;

use thiserror::Error;

/// Top-level error type for Zerograph client operations.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Entity is not bound to a remote graph: {0}")]
    NotBound(String),

    #[error("Entities belong to different graphs: {0}")]
    CrossGraph(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl GraphError {
    /// True when the server reported that the addressed entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote(e) if e.status == Status::NotFound)
    }

    /// True for errors that leave the connection unusable until reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

// ── Remote Errors ────────────────────────────────────────────────

/// Failure class reported by the server inside a reply document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    NotFound,
    MethodNotAllowed,
    Conflict,
    ServerError,
    Other(u16),
}

impl Status {
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => Self::BadRequest,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            409 => Self::Conflict,
            500 => Self::ServerError,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Conflict => 409,
            Self::ServerError => 500,
            Self::Other(code) => *code,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::Conflict => "Conflict",
            Self::ServerError => "Server Error",
            Self::Other(_) => "Error",
        };
        write!(f, "{} {}", self.code(), name)
    }
}

/// A failure embedded by the server in one reply document.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {message}")]
pub struct RemoteError {
    pub status: Status,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Classify a bare error message.
    ///
    /// Servers that only send text either lead with a status code
    /// (`"404 Node 7 not found"`) or phrase not-found failures as such;
    /// anything else is a bad request.
    pub fn from_message(message: &str) -> Self {
        let trimmed = message.trim();
        let mut parts = trimmed.splitn(2, ' ');
        if let (Some(head), rest) = (parts.next(), parts.next()) {
            if head.len() == 3 {
                if let Ok(code) = head.parse::<u16>() {
                    return Self::new(Status::from_code(code), rest.unwrap_or("").trim());
                }
            }
        }
        let status = if trimmed.to_ascii_lowercase().contains("not found") {
            Status::NotFound
        } else {
            Status::BadRequest
        };
        Self::new(status, trimmed)
    }
}
