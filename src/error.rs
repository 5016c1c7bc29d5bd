//! Error types for the visual regression pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or comparing snapshots
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start the browser session
    #[error("Session initialization failed: {0}")]
    SessionInit(String),

    /// The harness page reported JavaScript errors on load
    #[error("Harness page reported initialization errors: {0:?}")]
    PageScript(Vec<String>),

    /// The harness page exposes no examples
    #[error("No examples found on the harness page")]
    NoExamples,

    /// A specific example failed to render
    #[error("Render failed for \"{description}\": {message}")]
    Render { description: String, message: String },

    /// A harness script call failed or returned malformed data
    #[error("Harness script failed: {0}")]
    Script(String),

    /// Disk I/O failure while reading or writing artifacts
    #[error("Persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// PNG decode/encode or crop failure
    #[error("Image codec failed: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A remote command exceeded the hard ceiling
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Alignment input exceeds the supported row count
    #[error("Alignment input too large: {0}")]
    AlignmentInput(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Cdp(err.to_string())
    }
}
