use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store path `{0}`")]
    InvalidPath(String),
    #[error("store client is disconnected")]
    Disconnected,
    #[error("malformed value at `{path}`")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("score rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
