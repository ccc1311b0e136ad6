use thiserror::Error;
use tvm_cells::CellError;

/// Every failure mode of the codec and the get-method runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("type mismatch: expected `{expected}`, got `{got}`")]
    TypeMismatch { expected: String, got: String },

    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("unexpected function selector: expected {expected:#010x}, got {got:#010x}")]
    SelectorMismatch { expected: u32, got: u32 },

    #[error("no value for header parameter `{0}` and no default exists")]
    MissingHeaderValue(String),

    #[error("account is not active")]
    AccountInactive,

    #[error("VM terminated with exit code {exit_code}")]
    VmError { exit_code: i32 },

    #[error("cannot convert VM stack item into `{expected}`")]
    OutputTypeMismatch { expected: String },

    #[error("signature failure: {0}")]
    SignatureError(String),
}

impl AbiError {
    pub(crate) fn de(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    pub(crate) fn ser(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

pub type AbiResult<T> = Result<T, AbiError>;

/// Direction-aware adapter from cell-layer errors.
pub(crate) trait CellResultExt<T> {
    /// Treat a cell-layer failure as a [`AbiError::Serialization`]
    fn stored(self) -> AbiResult<T>;

    /// Treat a cell-layer failure as a [`AbiError::Deserialization`]
    fn loaded(self) -> AbiResult<T>;
}

impl<T> CellResultExt<T> for Result<T, CellError> {
    #[inline]
    fn stored(self) -> AbiResult<T> {
        self.map_err(|err| AbiError::Serialization(err.to_string()))
    }

    #[inline]
    fn loaded(self) -> AbiResult<T> {
        self.map_err(|err| AbiError::Deserialization(err.to_string()))
    }
}
