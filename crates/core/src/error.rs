use tonic::{Code, Status};

/// Failure while processing a single queue event.
///
/// The harness never surfaces these to a caller. It uses [`WorkerError::is_permanent`] to
/// choose between dropping the message and letting its visibility window expire.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error("no organization or provider found for {0}")]
    NoOrgOrProvider(String),
    #[error("{context} failed: {status}")]
    Rpc {
        context: &'static str,
        #[source]
        status: Status,
    },
    #[error("entity {0} not found")]
    EntityNotFound(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("invalid message content: {0}")]
    InvalidContent(String),
    #[error("blocked account store: {0}")]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl WorkerError {
    /// Wraps a downstream RPC failure, for use with `map_err`.
    pub fn rpc(context: &'static str) -> impl FnOnce(Status) -> WorkerError {
        move |status| WorkerError::Rpc { context, status }
    }

    /// Whether retrying the same event can never succeed.
    ///
    /// Malformed payloads, unrenderable content and precondition or argument rejections
    /// from downstream services are permanent. Everything else, including a missing
    /// organization for a routed message, is retried by visibility expiry.
    pub fn is_permanent(&self) -> bool {
        match self {
            WorkerError::Malformed(_) | WorkerError::InvalidContent(_) => true,
            WorkerError::Rpc { status, .. } => matches!(
                status.code(),
                Code::FailedPrecondition | Code::InvalidArgument
            ),
            _ => false,
        }
    }
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to receive from {url}: {message}")]
    Receive { url: String, message: String },
    #[error("failed to delete message from {url}: {message}")]
    Delete { url: String, message: String },
    #[error("failed to change message visibility on {url}: {message}")]
    ChangeVisibility { url: String, message: String },
}

/// Failure to decode the notification wrapper around a queued event.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid notification JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("undecodable event payload: {0}")]
    Event(#[from] prost::DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create store directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to write blocked account record: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read blocked account record: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize blocked account record: {0}")]
    Serialization(serde_json::Error),
    #[error("email cannot be empty")]
    EmptyEmail,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
