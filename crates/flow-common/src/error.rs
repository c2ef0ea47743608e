//! Error types for the wind flow crates.

use thiserror::Error;

/// Result type alias using FlowError.
pub type FlowResult<T> = Result<T, FlowError>;

/// Primary error type for field building, fetching and playback.
///
/// None of these are fatal to the host: every component that produces one
/// degrades to "no field" or "no data" and keeps the animation loop alive.
#[derive(Debug, Error)]
pub enum FlowError {
    // === Data Errors ===
    /// U/V metadata is missing or the two components disagree.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to parse dataset: {0}")]
    Parse(String),

    #[error("failed to fetch '{key}': {message}")]
    Fetch { key: String, message: String },

    // === Configuration Errors ===
    #[error("invalid configuration: {0}")]
    Config(String),

    // === Rendering Errors ===
    #[error("rendering failed: {0}")]
    Render(String),

    // === Actor Errors ===
    #[error("background worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl FlowError {
    /// Create a Validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a Parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a Fetch error for the given resource key.
    pub fn fetch(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Render error.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a WorkerUnavailable error.
    pub fn worker_unavailable(msg: impl Into<String>) -> Self {
        Self::WorkerUnavailable(msg.into())
    }

    /// Whether the error came from bad dataset content rather than transport.
    pub fn is_data_error(&self) -> bool {
        matches!(self, FlowError::Validation(_) | FlowError::Parse(_))
    }
}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        FlowError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Parse(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert!(FlowError::validation("x")
            .to_string()
            .starts_with("validation error:"));
        assert_eq!(
            FlowError::fetch("20240101", "timeout").to_string(),
            "failed to fetch '20240101': timeout"
        );
    }

    #[test]
    fn test_json_error_is_data_error() {
        let err: FlowError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(err.is_data_error());
        assert!(!FlowError::fetch("k", "m").is_data_error());
    }
}
