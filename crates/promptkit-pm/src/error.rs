//! Error types for the meta-prompt manager crate.

use std::path::PathBuf;

/// Errors that can occur in the meta-prompt manager.
#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    /// Template was found neither in the override directory nor among the built-ins.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Error occurred while rendering a template.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// Override directory does not exist or is not a directory.
    #[error("template directory not found: {0}")]
    TemplateDirectoryNotFound(PathBuf),

    /// Override directory listing failed.
    #[error("failed to list templates in {path}")]
    TemplateListError {
        /// Path to the template directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for meta-prompt manager operations.
pub type Result<T> = std::result::Result<T, PromptError>;
