use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::QueryKind;

/// Failure of a single call against the photo server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS, timeout or body-read failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {0}")]
    Status(StatusCode),

    /// The body was not the JSON we asked for.
    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),

    /// The configured host cannot carry API paths.
    #[error("host `{0}` cannot be used as a base URL")]
    BaseUrl(String),
}

/// A query-mode call that failed on the wire.
#[derive(Debug, Error)]
#[error("{mode} query failed: {source}")]
pub struct RemoteError {
    pub mode: QueryKind,
    #[source]
    pub source: ApiError,
}

/// A query that cannot be issued with the parameters it was given.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("album mode selected but no album-id configured")]
    MissingAlbumId,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Non-fatal signal raised when a refresh cycle could not replace the asset list.
#[derive(Debug, Error, Clone)]
#[error("asset list update failed: {0}")]
pub struct UpdateFailed(pub Arc<QueryError>);

/// Outcome of the connectivity probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("the server rejected the api key")]
    InvalidAuth,

    #[error("cannot connect to the server: {0}")]
    CannotConnect(String),
}
