//! Error types for PromptKit operations.
//!
//! Validation problems (missing variables while a form is being filled in,
//! unmet chain dependencies) are reported as data, not as errors. The
//! variants below cover the operations that genuinely fail: configuration,
//! storage, catalog mutations, and the service-level entry points that refuse
//! to render incomplete input.

use thiserror::Error;

/// Comprehensive error types for PromptKit operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PromptKitError {
    // Rendering errors
    /// Required variables were absent or blank when a full render was requested.
    #[error("missing required variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    /// A chain run was requested for a template that declares no steps.
    #[error("template has no chain steps: {0}")]
    NoChainSteps(String),

    /// Prompt text rejected before being sent to an executor.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    // Catalog errors
    /// Template with the given id was not found in the catalog.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A user-authored template tried to reuse a curated template id.
    #[error("template id is reserved by the curated catalog: {0}")]
    ReservedTemplateId(String),

    /// Template declares the same variable name more than once.
    #[error("duplicate variable names in template {id}: {}", .names.join(", "))]
    DuplicateVariables {
        /// Template identifier.
        id: String,
        /// Names declared more than once.
        names: Vec<String>,
    },

    /// Embedded curated catalog failed to parse.
    #[error("curated catalog parse error: {0}")]
    CatalogParseError(String),

    // Storage errors
    /// Error reading a value from the key-value store.
    #[error("storage read error: {0}")]
    StorageReadError(String),

    /// Error writing a value to the key-value store.
    #[error("storage write error: {0}")]
    StorageWriteError(String),

    /// Stored blob could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors
    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // Meta-prompt errors
    /// Meta-prompt manager failed to render a template.
    #[error(transparent)]
    Prompt(#[from] promptkit_pm::PromptError),

    // Executor errors
    /// The executor collaborator failed outside of a chain run.
    #[error("executor failed: {0}")]
    ExecutorFailed(String),

    // IO and system errors
    /// Standard IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PromptKit operations.
///
/// All fallible PromptKit operations return this type, using [`PromptKitError`]
/// for error variants.
pub type Result<T> = std::result::Result<T, PromptKitError>;
