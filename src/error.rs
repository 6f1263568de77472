//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! developer CLI uses `anyhow` for convenient error propagation. Nothing in
//! the page runtime returns these: transient platform failures are logged
//! and ignored where they happen.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum
//! - Module-specific errors ([`ConfigError`], [`ScenarioError`],
//!   [`PlatformError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use showcase::error::{Result, ResultExt};
//!
//! fn replay(path: &Path) -> Result<Snapshot> {
//!     let scenario = Scenario::from_path(path).with_context("loading scenario")?;
//!     Ok(headless::run(&Config::default(), &scenario)?)
//! }
//! ```

use crate::config::ConfigError;
use crate::headless::ScenarioError;
use crate::platform::PlatformError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scenario loading or replay error
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// Browser platform error
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ConfigError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Config(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ScenarioError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Scenario(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::Platform(PlatformError::Detached).context("while pausing");
        let msg = err.to_string();
        assert!(msg.contains("while pausing"));
        assert!(msg.contains("no longer attached"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Invalid("no sections declared".into()).into();
        assert!(err.to_string().contains("no sections declared"));
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), ScenarioError> =
            Err(ScenarioError::Parse("bad step".into()));
        let with_ctx = result.with_context("loading scenario");
        let msg = with_ctx.unwrap_err().to_string();
        assert!(msg.contains("loading scenario"));
        assert!(msg.contains("bad step"));
    }
}
