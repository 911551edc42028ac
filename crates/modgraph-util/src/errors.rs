use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all modgraph operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ModgraphError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed resolution configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the resolution configuration file for invalid coordinates"))]
    Config { message: String },

    /// Invalid or malformed module catalog.
    #[error("Catalog error: {message}")]
    #[diagnostic(help("Check the catalog file for syntax errors"))]
    Catalog { message: String },

    /// An exclude rule could not be turned into a filter.
    #[error("Invalid exclude rule: {message}")]
    Filter { message: String },

    /// Dependency resolution failed for a reason other than a conflict.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// A conflict had no deterministic winner.
    #[error("Conflict on {module}: {message}")]
    #[diagnostic(help(
        "Use the 'latest' conflict strategy, force a version, or declare a preferred capability provider"
    ))]
    Conflict { module: String, message: String },

    /// A serialized resolution result is inconsistent with itself.
    #[error("Corrupt serialized graph: {message}")]
    Corrupt { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

impl ModgraphError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

/// Convenience alias for `miette::Result<T>`.
pub type ModgraphResult<T> = miette::Result<T>;
