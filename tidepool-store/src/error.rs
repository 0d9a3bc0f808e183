use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("SDK error: {0}")]
    Sdk(String),
}

impl From<tidepool_sdk::Error> for StoreError {
    fn from(e: tidepool_sdk::Error) -> Self {
        StoreError::Sdk(e.to_string())
    }
}
