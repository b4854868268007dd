//! Error types for the WAPI client.
//!
//! # Design
//! The variants separate the three failures callers act on differently:
//! rejected credentials (`Authentication`), a request the appliance refused
//! (`Api`, which carries the raw status and body, 404 included), and a
//! network that never produced a response (`Connection`). Construction
//! problems surface before any request is sent as `Configuration`, and a
//! request that cannot be encoded as `InvalidRequest`.

use thiserror::Error;

/// Result alias used throughout the client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by `WapiClient` and the managers built on it.
#[derive(Debug, Error)]
pub enum Error {
    /// The client could not be built from the supplied settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The appliance answered 401.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The appliance answered with a non-2xx status other than 401.
    #[error("API request failed: {status} - {body}")]
    Api { status: u16, body: String },

    /// No response was received, even after retrying.
    #[error("request failed after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    /// The request could not be turned into a valid HTTP request. Never
    /// retried: nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// HTTP status carried by an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Authentication(_) => Some(401),
            _ => None,
        }
    }

    /// True when the appliance reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Failure to obtain any response from a transport.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
