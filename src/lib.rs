//! # `mdbase_tasknotes`
//!
//! Task management over a folder of markdown documents with YAML
//! frontmatter: fuzzy task references, recurring-task scheduling with
//! per-date instance overlays, and a schema-driven field role mapping.

pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod collection;
pub mod config;
pub mod dates;
pub mod error;
pub mod fields;
pub mod format;
pub mod ident;
pub mod overlay;
pub mod query;
pub mod recurrence;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod task;
pub mod testing;

pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
