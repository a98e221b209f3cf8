//! Error types for the analysis service
use thiserror::Error;

/// Analysis service errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// A single feature fetch attempt failed
    #[error("Feature fetch failed: {0}")]
    FeatureFetch(String),

    /// The host platform cannot be reached at all
    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    /// The service task has been torn down
    #[error("Analysis service stopped")]
    ServiceStopped,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
