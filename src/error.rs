//! Error types for `mdbase_tasknotes`.

use std::path::PathBuf;

/// Errors that can occur while working with a task collection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regex error occurred.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A date string was empty where a date was required.
    #[error("Date string cannot be empty")]
    EmptyDate,

    /// A date string could not be parsed.
    #[error("Invalid date \"{0}\".")]
    InvalidDate(String),

    /// A user-supplied date was not in `YYYY-MM-DD` form.
    #[error("Invalid date \"{0}\". Expected YYYY-MM-DD.")]
    InvalidDateFormat(String),

    /// A task reference matched no documents.
    #[error("No task found matching \"{0}\"")]
    TaskNotFound(String),

    /// A task reference matched more than one document. The payload is the
    /// fully rendered, ranked candidate listing.
    #[error("{0}")]
    AmbiguousTask(String),

    /// A where-expression could not be parsed.
    #[error("Invalid query expression: {0}")]
    InvalidQuery(String),

    /// A document type is not declared in the collection schema.
    #[error("Unknown document type \"{0}\"")]
    UnknownType(String),

    /// A collection could not be opened at the given path.
    #[error("Failed to open collection at {path}: {reason}")]
    CollectionOpen {
        /// The collection root that was tried.
        path: PathBuf,
        /// Why opening failed.
        reason: String,
    },

    /// A document was not found in the collection.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// `init` found an existing schema file and was not forced.
    #[error("{file} already exists at {path}. Use --force to overwrite.")]
    AlreadyInitialized {
        /// The schema file that already exists.
        file: String,
        /// The collection root.
        path: PathBuf,
    },

    /// The home directory could not be determined for config resolution.
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
