use thiserror::Error;

/// Core error type for engine-side operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO errors from buffer operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema-related errors
    #[error("schema error: {0}")]
    Schema(String),

    /// Row serialization errors
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Partition payloads that fail validation while decoding
    #[error("corrupt partition: {0}")]
    Corrupt(String),

    /// Partition allocation failures
    #[error("allocation error: {0}")]
    Alloc(String),

    /// Unsupported operation errors
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Internal errors that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),

    /// UTF-8 decoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias for engine-side operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a new schema error
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        CoreError::Schema(msg.into())
    }

    /// Create a new serialization error
    pub fn serialize<S: Into<String>>(msg: S) -> Self {
        CoreError::Serialize(msg.into())
    }

    /// Create a new corrupt-partition error
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        CoreError::Corrupt(msg.into())
    }

    /// Create a new allocation error
    pub fn alloc<S: Into<String>>(msg: S) -> Self {
        CoreError::Alloc(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        CoreError::Unsupported(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        CoreError::Internal(msg.into())
    }
}

/// Extension trait to add context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, ctx: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<CoreError>,
{
    fn context<S: Into<String>>(self, ctx: S) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            CoreError::Internal(format!("{}: {}", ctx.into(), base_error))
        })
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            CoreError::Internal(format!("{}: {}", f().into(), base_error))
        })
    }
}
