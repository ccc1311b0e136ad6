use thiserror::Error;

/// Errors from building or reading cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("cell data overflow: {bits} more bits do not fit into {left} left")]
    DataOverflow { bits: usize, left: usize },

    #[error("cell cannot hold more than {max} references")]
    TooManyReferences { max: usize },

    #[error("integer does not fit into {bits} bits")]
    IntegerOverflow { bits: usize },

    #[error("not enough data in slice: requested {requested} bits, {left} left")]
    DataUnderflow { requested: usize, left: usize },

    #[error("no more references left")]
    NoMoreReferences,

    #[error("more data left: {bits} bits, {references} references")]
    NotExhausted { bits: usize, references: usize },

    #[error("malformed cell data: {0}")]
    InvalidData(String),
}

impl CellError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

pub type CellResult<T> = Result<T, CellError>;
