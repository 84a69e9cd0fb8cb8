use docshard_core::Key;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("coordination service unavailable: {0}")]
    Unavailable(String),

    #[error("lock on {key} is held by a different owner")]
    NotHolder { key: Key },

    #[error("coordinator already stopped")]
    Stopped,
}
