//! Error types for the Kasumi site generator.
//!
//! Mistakes inside a template (a malformed `if`, an unknown loop collection)
//! never show up here; the engine renders an inline diagnostic instead.
//! These errors are the ones that abort rendering a page.

use thiserror::Error;

pub use kasumi_ast::{Location, ScanError};

/// All errors that can occur in Kasumi
#[derive(Error, Debug)]
pub enum KasumiError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Layout '{name}' does not exist")]
    UnknownLayout { name: String },

    #[error("Include '{name}' does not exist")]
    UnknownInclude { name: String },

    #[error("Includes still unresolved after {limit} rounds (last seen: '{name}'), is there a cycle?")]
    IncludeDepthExceeded { name: String, limit: usize },

    #[error("Post '{name}' filename does not match YYYY-MM-DD-slug")]
    InvalidPostName { name: String },

    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Error generating '{name}': {source}")]
    Page {
        name: String,
        #[source]
        source: Box<KasumiError>,
    },
}

impl KasumiError {
    /// Attach the name of the page being generated.
    pub fn in_page(self, name: impl Into<String>) -> Self {
        KasumiError::Page {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for Kasumi operations
pub type Result<T> = std::result::Result<T, KasumiError>;
