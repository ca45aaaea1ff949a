//! Error types for pgexplorer
//!
//! This module defines the error hierarchy used throughout the application.
//! We use `thiserror` for library-style errors with clear error chains.
//! None of these are fatal to the shell: every kind ends up as a status
//! message and the user decides whether to try again.

use std::io;
use std::path::PathBuf;

/// Main error type for the pgexplorer application
#[derive(Debug, thiserror::Error)]
pub enum PgExplorerError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Preference/configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CSV or chart export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Chart rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Database operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection (auth, network, timeout, TLS, anything else)
    #[error("Could not connect to database.\nDetails: {0}")]
    ConnectionFailed(String),

    /// Query execution failed; the session stays usable
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Catalog lookup for one tree node failed
    #[error("Failed to load {target}: {message}")]
    CatalogLoadFailed { target: String, message: String },

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// A session is already open and must be closed first
    #[error("Already connected; disconnect before opening another session")]
    AlreadyConnected,

    /// Releasing the session reported an error
    #[error("Error during disconnection: {0}")]
    CloseFailed(String),
}

/// Preference loading/saving errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Failed to parse or serialize JSON
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Failed to read or write the preferences file
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result and chart export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Nothing to export
    #[error("No data to export")]
    NoData,

    /// Writing the output file failed (partial files are left in place)
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File extension does not name a supported image format
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// The chart could not be drawn for export
    #[error("Failed to export chart: {0}")]
    Render(#[from] RenderError),
}

/// Chart rendering errors, shown to the user in place of the chart
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// No result set is loaded
    #[error("No data available")]
    NoData,

    /// A selected column is not in the current result set
    #[error("Column '{0}' is not in the result set")]
    MissingColumn(String),

    /// A numeric-only chart was given a non-numeric column
    #[error("Column '{0}' is not numeric")]
    NonNumeric(String),

    /// Heatmaps need at least two numeric columns
    #[error("Not enough numeric columns for correlation analysis (found {found})")]
    NotEnoughNumericColumns { found: usize },

    /// Nothing left to draw once nulls and non-numeric values are dropped
    #[error("No plottable data for '{0}'")]
    EmptyData(String),

    /// Values the chart cannot represent, such as negative pie slices
    #[error("{0}")]
    InvalidData(String),

    /// The drawing backend failed
    #[error("Drawing failed: {0}")]
    Backend(String),
}

/// Specialized Result type for pgexplorer operations
pub type Result<T> = std::result::Result<T, PgExplorerError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized Result type for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Specialized Result type for chart rendering
pub type RenderResult<T> = std::result::Result<T, RenderError>;
