//! Error types for description loading.

use thiserror::Error;

/// Errors that can occur while reading a robot description.
#[derive(Error, Debug)]
pub enum DescriptionError {
    /// IO failure while reading a description file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON description.
    #[error("Invalid JSON description: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML description.
    #[error("Invalid TOML description: {0}")]
    Toml(#[from] toml::de::Error),

    /// URDF could not be parsed.
    #[error("Failed to parse URDF: {0}")]
    Urdf(String),

    /// The description defines no links at all.
    #[error("Description '{0}' has no links")]
    Empty(String),

    /// Two links share the same name.
    #[error("Duplicate link name: {0}")]
    DuplicateLink(String),

    /// The file extension does not map to a known description format.
    #[error("Unsupported description format: {0}")]
    UnsupportedFormat(String),
}
