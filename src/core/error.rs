//! Error handling and error types for HugeWood.
//!
//! Configuration and data problems are reported before any tree is grown.
//! Algorithmic edge cases (constant features, splits that do not advance)
//! are never errors; they resolve to leaves inside the tree builder.

use std::io;
use thiserror::Error;

/// Main error type for the HugeWood library.
#[derive(Error, Debug)]
pub enum WoodError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Training data errors (e.g. labels that cannot be mapped to classes)
    #[error("Data error: {message}")]
    Data { message: String },

    /// Tree construction and grafting errors
    #[error("Tree construction error: {message}")]
    TreeConstruction { message: String },

    /// Prediction errors
    #[error("Prediction error: {message}")]
    Prediction { message: String },

    /// Worker pool errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parse error: {source}")]
    TomlDe {
        #[from]
        source: toml::de::Error,
    },

    /// TOML serialization errors
    #[error("TOML serialization error: {source}")]
    TomlSer {
        #[from]
        source: toml::ser::Error,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Out of bounds access
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },
}

/// Type alias for Results using WoodError
pub type Result<T> = std::result::Result<T, WoodError>;

impl WoodError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        WoodError::Config {
            message: message.into(),
        }
    }

    /// Create a data error
    pub fn data<S: Into<String>>(message: S) -> Self {
        WoodError::Data {
            message: message.into(),
        }
    }

    /// Create a tree construction error
    pub fn tree_construction<S: Into<String>>(message: S) -> Self {
        WoodError::TreeConstruction {
            message: message.into(),
        }
    }

    /// Create a prediction error
    pub fn prediction<S: Into<String>>(message: S) -> Self {
        WoodError::Prediction {
            message: message.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        WoodError::Threading {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        WoodError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        WoodError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        WoodError::IndexOutOfBounds { index, length }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            WoodError::Config { .. } => false,
            WoodError::Data { .. } => false,
            WoodError::TreeConstruction { .. } => true,
            WoodError::Prediction { .. } => true,
            WoodError::Threading { .. } => true,
            WoodError::Io { .. } => false,
            WoodError::Json { .. } => false,
            WoodError::TomlDe { .. } => false,
            WoodError::TomlSer { .. } => false,
            WoodError::InvalidParameter { .. } => false,
            WoodError::DimensionMismatch { .. } => false,
            WoodError::IndexOutOfBounds { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            WoodError::Config { .. } => "config",
            WoodError::Data { .. } => "data",
            WoodError::TreeConstruction { .. } => "tree_construction",
            WoodError::Prediction { .. } => "prediction",
            WoodError::Threading { .. } => "threading",
            WoodError::Io { .. } => "io",
            WoodError::Json { .. } => "json",
            WoodError::TomlDe { .. } | WoodError::TomlSer { .. } => "toml",
            WoodError::InvalidParameter { .. } => "invalid_parameter",
            WoodError::DimensionMismatch { .. } => "dimension_mismatch",
            WoodError::IndexOutOfBounds { .. } => "index_out_of_bounds",
        }
    }
}
