//! Error types for the management API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the named vhost or resource does not exist" from "the broker returned an
//! unexpected status." It is only produced for vhost-scoped lookups; a 404 on
//! a broker-wide endpoint stays a plain `Http` error. `Network` covers every
//! failure where no HTTP response was received at all.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the management API client.
#[derive(Debug, Error)]
pub enum Error {
    /// The broker could not be reached: DNS failure, refused connection,
    /// timeout, or a connection dropped while reading the body.
    #[error("network error: {0}")]
    Network(String),

    /// The broker answered with a non-2xx status not otherwise classified.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// The broker answered 404 for a vhost-scoped lookup.
    #[error("{}", describe_missing(.resource, .scope))]
    NotFound { resource: String, scope: String },

    /// The response body could not be deserialized into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// HTTP status behind this error, if the broker answered at all.
    ///
    /// `NotFound` reports 404 so it can still be handled as an HTTP failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

fn describe_missing(resource: &str, scope: &str) -> String {
    if resource == "vhost" {
        format!("vhost '{scope}' does not exist")
    } else {
        format!("{resource} does not exist in vhost '{scope}'")
    }
}
