use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown tenant status: {0}")]
    UnknownStatus(String),
}
