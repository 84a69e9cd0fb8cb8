use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("backend io error: {0}")]
    Io(#[from] std::io::Error),
}
