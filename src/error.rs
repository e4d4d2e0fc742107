use thiserror::Error;

/// Failure of a forum operation, classified the way the HTTP layer reports it.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("not logged in")]
    Unauthenticated,

    #[error("insufficient privileges")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} requires the relational storage backend")]
    BackendUnsupported(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ForumError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

impl From<rusqlite::Error> for ForumError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<r2d2::Error> for ForumError {
    fn from(err: r2d2::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<serde_json::Error> for ForumError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.into())
    }
}

pub type ForumResult<T> = Result<T, ForumError>;
