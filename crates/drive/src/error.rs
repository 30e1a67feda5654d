use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    /// Access token rejected; the session has to re-authorize
    #[error("Drive rejected the access token")]
    Unauthorized,

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("invalid file id: {0:?}")]
    InvalidFileId(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("Drive API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode Drive response: {0}")]
    Decode(String),
}

impl DriveError {
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, DriveError::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
