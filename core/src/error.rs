//! Error types for the LocalBitcoins API client.
//!
//! # Design
//! Every failure of a call ends up in exactly one `ApiError` variant and is
//! terminal for that call. `UnknownMethod`, `MissingParameter` and
//! `Configuration` are raised before any network activity. `Api` carries the
//! service's own `error` object untouched so callers can match on its
//! `error_code` without this crate knowing the vocabulary.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Errors returned by `LbcClient` operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// The method name is not part of any known method group.
    #[error("{0} is not a valid API method")]
    UnknownMethod(String),

    /// A parameter required to build the request was not supplied.
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    /// Client configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The transport failed before a response body was received.
    #[error("error in server response: {0}")]
    Transport(#[from] TransportError),

    /// The response body is not valid JSON.
    #[error("could not understand response from server (HTTP {status}): {body}")]
    MalformedResponse { status: u16, body: String },

    /// The service answered with an `error` object.
    #[error("API error: {0}")]
    Api(serde_json::Value),
}

/// Opaque failure reported by a `Transport` (DNS, refused connection,
/// timeout, broken body stream).
///
/// Wraps the underlying error without exposing the HTTP library's types in
/// the public API.
#[derive(Debug)]
pub struct TransportError {
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl TransportError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            source: source.into(),
        }
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport failure: {}", self.source)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}
