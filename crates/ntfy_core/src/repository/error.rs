use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository failure, classified by the kind of store access that failed.
///
/// The wrapped [`StoreError`] is relayed unchanged; the repository never
/// retries or recovers.
#[derive(Debug)]
pub enum RepositoryError {
    StoreRead(StoreError),
    StoreWrite(StoreError),
    /// The worker task running a store call panicked or was cancelled.
    Worker(String),
}

impl RepositoryError {
    pub(crate) fn read(err: StoreError) -> Self {
        Self::StoreRead(err)
    }

    pub(crate) fn write(err: StoreError) -> Self {
        Self::StoreWrite(err)
    }

    /// Returns the relayed store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::StoreRead(err) | Self::StoreWrite(err) => Some(err),
            Self::Worker(_) => None,
        }
    }
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreRead(err) => write!(f, "store read failed: {err}"),
            Self::StoreWrite(err) => write!(f, "store write failed: {err}"),
            Self::Worker(message) => write!(f, "repository worker failed: {message}"),
        }
    }
}

impl Error for RepositoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreRead(err) | Self::StoreWrite(err) => Some(err),
            Self::Worker(_) => None,
        }
    }
}
