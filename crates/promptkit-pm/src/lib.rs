//! Meta-prompt manager crate for PromptKit.
//!
//! This crate provides template loading and rendering capabilities using minijinja.
//! It serves the built-in meta-prompts used to enhance and refine user prompts,
//! and lets users shadow them with their own `.j2` files.
//!
//! # Examples
//!
//! ```
//! use promptkit_pm::{MetaPrompt, MetaPromptContext, PromptEngine, PromptManager};
//!
//! let manager = PromptManager::builtin();
//! let context = MetaPromptContext::new("explain ownership in rust");
//!
//! let prompt = manager.get_meta_prompt(MetaPrompt::Improve, &context)?;
//! assert!(prompt.contains("explain ownership in rust"));
//! # Ok::<(), promptkit_pm::PromptError>(())
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod manager;

// Re-export public types for convenience
pub use context::MetaPromptContext;
pub use engine::{MetaPrompt, PromptEngine};
pub use error::{PromptError, Result};
pub use manager::PromptManager;
