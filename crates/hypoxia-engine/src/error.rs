//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hypoxia_core::ConfigError,
    },

    /// No Tokio runtime was available to drive the sampler.
    #[error("no Tokio runtime available for the scheduler")]
    NoRuntime,
}
