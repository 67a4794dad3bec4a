use thiserror::Error;

use crate::logging::LoggingError;

/// Unified result type for the render core.
pub type Result<T> = std::result::Result<T, FiberError>;

/// Errors surfaced by the fiber engine, the wire serializer and the session loop.
#[derive(Debug, Error)]
pub enum FiberError {
    #[error("`{hook}` called outside an active fiber")]
    OutsideActiveFiber { hook: &'static str },
    #[error(
        "hook order mismatch in fiber `{fiber}` at slot {index}: expected `{expected}`, found `{found}`"
    )]
    HookOrderMismatch {
        fiber: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("fiber `{fiber}` is not registered")]
    UnknownFiber { fiber: String },
    #[error("context `{context}` received a value of the wrong type")]
    ContextMismatch { context: u64 },
    #[error("prop `{prop}` must be {expected}")]
    InvalidProp { prop: String, expected: &'static str },
    #[error("cannot serialize field `{field}`: unsupported value kind `{kind}`")]
    UnsupportedValue { field: String, kind: &'static str },
    #[error("field `{field}` exceeds maximum byte length ({bytes} > {max})")]
    StringTooLong {
        field: String,
        bytes: usize,
        max: usize,
    },
    #[error("invalid reserved byte count: {0}")]
    InvalidReservedBytes(String),
    #[error("payload needs {fields} fields, more than the {max} that get distinct markers")]
    PayloadTooLarge { fields: usize, max: usize },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("{0}")]
    Application(String),
    #[error("host capability failed: {0}")]
    Host(String),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl FiberError {
    /// Error raised by component bodies, effects or cleanups.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application(message.into())
    }

    /// True for misuse errors that abort the current render cycle.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::OutsideActiveFiber { .. }
                | Self::HookOrderMismatch { .. }
                | Self::ContextMismatch { .. }
                | Self::InvalidProp { .. }
                | Self::UnsupportedValue { .. }
                | Self::StringTooLong { .. }
                | Self::InvalidReservedBytes(_)
                | Self::PayloadTooLarge { .. }
        )
    }
}
