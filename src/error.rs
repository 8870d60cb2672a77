//! Error types for the checkpoint orchestrator

use thiserror::Error;

/// Orchestrator result type
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification, also persisted alongside a failed async entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ContainerNotFound,
    UpstreamProtocol,
    Timeout,
    Io,
    ClusterApi,
    BadRequest,
}

/// Errors that can occur while driving a checkpoint run.
#[derive(Error, Debug)]
pub enum Error {
    /// The node agent reported that the target container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The node agent or cluster API returned an unexpected status or body.
    #[error("upstream protocol error: {0}")]
    UpstreamProtocol(String),

    /// A polling loop exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Filesystem, archive, or template I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster API call failed (create/get/delete/list).
    #[error("cluster api error: {0}")]
    ClusterApi(String),

    /// Malformed request (bad path, bad query, bad JSON body).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid process configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client error talking to the node agent or a peer checkpointer.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cluster API client error (surfaced separately from ClusterApi so `#[from]` works).
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    pub fn container_not_found(msg: impl Into<String>) -> Self {
        Self::ContainerNotFound(msg.into())
    }

    pub fn upstream_protocol(msg: impl Into<String>) -> Self {
        Self::UpstreamProtocol(msg.into())
    }

    pub fn cluster_api(msg: impl Into<String>) -> Self {
        Self::ClusterApi(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable classification used for HTTP status mapping and persisted failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ContainerNotFound(_) => ErrorKind::ContainerNotFound,
            Error::UpstreamProtocol(_) => ErrorKind::UpstreamProtocol,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Io(_) => ErrorKind::Io,
            Error::ClusterApi(_) | Error::Kube(_) => ErrorKind::ClusterApi,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Config(_) => ErrorKind::Io,
            Error::Http(_) => ErrorKind::UpstreamProtocol,
            Error::Json(_) => ErrorKind::UpstreamProtocol,
        }
    }
}
