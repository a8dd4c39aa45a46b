use thiserror::Error;

use crate::index::IndexError;

#[derive(Error, Debug)]
pub enum CardlensError {
    #[error("image decode error: {0}")]
    Decode(String),

    #[error("catalog fetch error: {0}")]
    Fetch(String),

    #[error("index storage error: {0}")]
    Storage(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

impl From<IndexError> for CardlensError {
    fn from(e: IndexError) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CardlensError>;
