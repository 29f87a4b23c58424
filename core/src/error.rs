use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataTablesError {
    /// A relation kind the resolver cannot express as a join
    #[error("Relation [{relation}] on [{entity}] is not yet supported: {kind}")]
    UnsupportedRelation {
        entity: String,
        relation: String,
        kind: &'static str,
    },

    /// Entity name missing from the schema
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Relation name missing from its entity
    #[error("Unknown relation [{relation}] on [{entity}]")]
    UnknownRelation { entity: String, relation: String },

    /// Request body is not JSON at all
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error raised by the underlying data source
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for datatable operations
pub type Result<T> = std::result::Result<T, DataTablesError>;
