use crate::transport::TransportError;
use pollbot_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("malformed vote token")]
    MalformedToken,
    #[error("poll not found")]
    PollNotFound,
    #[error("choice {choice} is not between 1 and {option_count}")]
    InvalidChoice { choice: u32, option_count: usize },
    #[error("voter is not logged in")]
    Unauthenticated,
    #[error("login token not found")]
    TokenNotFound,
    #[error("login token already used")]
    TokenAlreadyUsed,
    #[error("login token expired")]
    TokenExpired,
    #[error("{0}")]
    InvalidCommand(String),
    #[error("chat transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] DbError),
}
