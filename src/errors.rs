//! Error types for postrun

use thiserror::Error;

/// Main error type for postrun
#[derive(Error, Debug)]
pub enum PostrunError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// A collection, environment or parameter file was rejected at import time
    #[error("Import error: {0}")]
    Import(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Run error: {0}")]
    Pipeline(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl From<rquickjs::Error> for PostrunError {
    fn from(err: rquickjs::Error) -> Self {
        PostrunError::Script(format!("JavaScript error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PostrunError>;
