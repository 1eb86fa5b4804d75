use thiserror::Error;

/// Why a collaborator call (data source, model, chat transport) failed.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("unauthorized request to {0}")]
    Unauthorized(String),

    #[error("something went wrong when requesting [CODE: {status}]: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("model returned no choices")]
    EmptyResponse,
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Failures of the durable budget record.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
