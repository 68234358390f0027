//! PromptKit Core - prompt templating and chain execution engine.
//!
//! This crate renders parameterized prompt templates, validates and executes
//! chains of dependent sub-prompts, and adapts rendered prompts for a target
//! model and output format. The only I/O it performs on its own behalf goes
//! through the [`KvStore`] adapter; text generation is delegated to a caller
//! supplied [`PromptExecutor`].
//!
//! # Architecture
//!
//! - [`variables`]: placeholder extraction, partial rendering, validation, usage history
//! - [`chain`]: chain validation and strictly sequential execution
//! - [`adapter`]: token optimization, format instructions, model prefixes
//! - [`catalog`]: curated and user-authored templates, favorites
//! - [`service`]: orchestration of the above
//! - [`enhance`]: meta-prompt driven prompt enhancement
//! - [`storage`], [`history`]: key-value persistence adapters
//! - [`config`], [`error`]: configuration and error types
//!
//! # Example
//!
//! ```
//! use promptkit_core::{TemplateService, VariableContext};
//!
//! let service = TemplateService::in_memory()?;
//! let template = service.template("writing-summarize")?;
//!
//! let mut values = VariableContext::new();
//! values.insert("text".into(), "Ownership moves values between bindings.".into());
//! values.insert("summaryLength".into(), "1-2 sentences".into());
//!
//! let rendered = service.render_full_template(&template, &values, None)?;
//! assert!(rendered.rendered_prompt.contains("Ownership moves values"));
//! # Ok::<(), promptkit_core::PromptKitError>(())
//! ```

pub mod adapter;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod enhance;
pub mod error;
pub mod history;
pub mod service;
pub mod storage;
pub mod types;
pub mod variables;

// Re-export core types for convenience
pub use adapter::{Adaptation, AdaptationOptions, OutputFormat, TargetModel};
pub use catalog::TemplateCatalog;
pub use chain::{
    ChainResult, ChainState, ChainValidation, FnExecutor, PromptExecutor, StepResult,
};
pub use config::{ChainConfig, HistoryConfig, PromptKitConfig};
pub use enhance::Enhancer;
pub use error::{PromptKitError, Result};
pub use history::{HistoryStore, KvHistoryStore, MemoryHistoryStore};
pub use service::{AdaptingExecutor, RenderedTemplate, TemplateService};
pub use storage::{FileKvStore, KvStore, MemoryKvStore};
pub use types::{
    ChainStep, Template, TemplateCategory, UserTemplateData, ValidationReport,
    VariableContext, VariableDefinition, VariableHistory, VariableType,
};
pub use variables::VariableEngine;
