use thiserror::Error;

/// Errors returned by [`Line`](crate::Line) and its wrappers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key is absent or its entry has expired.
    #[error("record is not found")]
    NotFound,

    /// Rejected constructor argument.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
