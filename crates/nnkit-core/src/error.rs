use crate::DType;

/// Broad classification of an [`NnError`].
///
/// Configuration and type errors are raised while binding a kernel and mean
/// the graph is malformed. `OutOfBounds` and `Exec` indicate a defect in
/// bind-time validation or a caller breaking the binding contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    UnsupportedType,
    OutOfBounds,
    Exec,
}

/// Errors produced by variables, accessors and kernels.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NnError {
    #[error("{function}: expected {expected} inputs, got {got}")]
    InputArity {
        function: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{function}: expected {expected} outputs, got {got}")]
    OutputArity {
        function: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("base_axis {base_axis} out of range [0, {rank}]")]
    BaseAxisOutOfRange { base_axis: i64, rank: usize },

    #[error("output leading extent {got} does not match input batch extent {expected}")]
    BatchMismatch { expected: usize, got: usize },

    #[error("{operand}: element count overflows usize")]
    ExtentOverflow { operand: &'static str },

    #[error("{operand}: expected {expected} elements, got {got}")]
    ElementCount {
        operand: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("buffer of {got} bytes cannot hold {numel} elements of {dtype} ({expected} bytes)")]
    BufferTooSmall {
        dtype: DType,
        numel: usize,
        expected: usize,
        got: usize,
    },

    #[error("output variable is also bound as input #{input}")]
    AliasedOutput { input: usize },

    #[error("no scalar accessor for dtype {0}")]
    UnsupportedDType(DType),

    #[error("index {index} out of bounds for {len} elements")]
    OutOfBounds { index: usize, len: usize },

    #[error("{0}: exec called before bind")]
    NotBound(&'static str),

    #[error("{0}: kernel has been released")]
    Released(&'static str),

    #[error("{operand} changed dtype or size since bind")]
    StaleBinding { operand: &'static str },

    #[error("function '{0}' is not implemented")]
    Unimplemented(&'static str),
}

impl NnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NnError::InputArity { .. }
            | NnError::OutputArity { .. }
            | NnError::BaseAxisOutOfRange { .. }
            | NnError::BatchMismatch { .. }
            | NnError::ExtentOverflow { .. }
            | NnError::ElementCount { .. }
            | NnError::BufferTooSmall { .. }
            | NnError::AliasedOutput { .. }
            | NnError::Unimplemented(_) => ErrorKind::Configuration,
            NnError::UnsupportedDType(_) => ErrorKind::UnsupportedType,
            NnError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            NnError::NotBound(_) | NnError::Released(_) | NnError::StaleBinding { .. } => {
                ErrorKind::Exec
            }
        }
    }

    /// Whether this error was raised by bind-time validation.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
