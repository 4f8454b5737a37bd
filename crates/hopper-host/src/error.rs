use thiserror::Error;

/// Error type for the host-facing side of the engine
#[derive(Error, Debug)]
pub enum HostError {
    /// Errors bubbling up from the engine core
    #[error(transparent)]
    Core(#[from] hopper_core::CoreError),

    /// Type or column inference failures
    #[error("inference error: {0}")]
    Inference(String),

    /// Invalid caller-supplied arguments
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Fatal context-construction failures
    #[error("startup error: {0}")]
    Startup(String),

    /// Operations the engine does not provide
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// IO errors from file sources and filesystem operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors from option dictionaries and mapping payloads
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited-file parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed file patterns
    #[error("pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Result type alias for host-facing operations
pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        HostError::Inference(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        HostError::InvalidArgument(msg.into())
    }

    /// Create a new startup error
    pub fn startup<S: Into<String>>(msg: S) -> Self {
        HostError::Startup(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        HostError::Unsupported(msg.into())
    }
}
