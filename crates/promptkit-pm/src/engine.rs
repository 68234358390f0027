//! Core prompt engine trait definition.

use crate::error::{PromptError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Built-in meta-prompts used by the enhancement flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaPrompt {
    /// One-click enhancement of a rough prompt.
    Improve,

    /// Generates clarifying questions about a rough prompt.
    RefineQuestions,

    /// Enhances a prompt using answered clarifying questions.
    RefineEnhance,
}

impl MetaPrompt {
    /// All meta-prompts, in declaration order.
    pub const ALL: [MetaPrompt; 3] = [
        MetaPrompt::Improve,
        MetaPrompt::RefineQuestions,
        MetaPrompt::RefineEnhance,
    ];

    /// Returns the template name (without extension) backing this meta-prompt.
    pub fn template_name(&self) -> &'static str {
        match self {
            MetaPrompt::Improve => "improve",
            MetaPrompt::RefineQuestions => "refine_questions",
            MetaPrompt::RefineEnhance => "refine_enhance",
        }
    }
}

impl fmt::Display for MetaPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template_name())
    }
}

impl FromStr for MetaPrompt {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        MetaPrompt::ALL
            .into_iter()
            .find(|kind| kind.template_name() == s)
            .ok_or_else(|| PromptError::TemplateNotFound(s.to_string()))
    }
}

/// Trait for rendering templates with dynamic context.
///
/// Implementations handle loading and rendering of templates using a
/// template engine like minijinja.
///
/// # Examples
///
/// ```
/// use promptkit_pm::{MetaPrompt, MetaPromptContext, PromptEngine, PromptManager};
///
/// let manager = PromptManager::builtin();
/// let context = MetaPromptContext::new("summarize this article");
/// let rendered = manager.render(MetaPrompt::Improve.template_name(), &context)?;
/// assert!(rendered.contains("summarize this article"));
/// # Ok::<(), promptkit_pm::PromptError>(())
/// ```
pub trait PromptEngine {
    /// Renders a template with the provided context.
    ///
    /// # Arguments
    ///
    /// * `template` - Name of the template to render (without extension)
    /// * `ctx` - Context data to use for rendering
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The template does not exist
    /// - The template contains syntax errors
    /// - Template rendering fails
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String>;

    /// Renders one of the built-in meta-prompts.
    ///
    /// This is a convenience wrapper around [`PromptEngine::render`] keyed by
    /// [`MetaPrompt`] instead of a free-form name.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is missing or rendering fails.
    fn get_meta_prompt<T: Serialize>(&self, kind: MetaPrompt, ctx: &T) -> Result<String> {
        self.render(kind.template_name(), ctx)
    }

    /// Lists all available templates.
    ///
    /// Returns template names (without extensions), sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if an override directory cannot be read.
    fn list_templates(&self) -> Result<Vec<String>>;
}
