//! Template engine error types

use thiserror::Error;

/// Template-specific errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// No template registered under this name
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template parsing or rendering error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// IO error while reading override templates
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
