use crate::oracle::OracleError;
use crate::publish::PublishError;
use crate::sensor::normalizer::NormalizeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error("invalid sensor event: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}
