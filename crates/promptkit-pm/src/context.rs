//! Context structures for meta-prompt rendering.

use serde::Serialize;

/// Context data provided to meta-prompt templates.
///
/// Every field is optional from the template's point of view: a template
/// that does not reference a field simply ignores it, and a referenced but
/// empty field renders as an empty string.
///
/// # Examples
///
/// ```
/// use promptkit_pm::MetaPromptContext;
///
/// let context = MetaPromptContext::new("write a haiku about rust");
/// assert_eq!(context.input, "write a haiku about rust");
/// assert!(context.original_prompt.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetaPromptContext {
    /// The user's rough prompt (used by `improve` and `refine_questions`).
    pub input: String,

    /// The prompt being refined (used by `refine_enhance`).
    pub original_prompt: String,

    /// Formatted question/answer context (used by `refine_enhance`).
    pub context: String,
}

impl MetaPromptContext {
    /// Creates a context carrying only the user's input.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Sets the original prompt for refine-enhance rendering.
    ///
    /// # Examples
    ///
    /// ```
    /// use promptkit_pm::MetaPromptContext;
    ///
    /// let context = MetaPromptContext::default()
    ///     .with_original_prompt("draft a README")
    ///     .with_context("Q: Audience?\nA: New contributors");
    /// assert_eq!(context.original_prompt, "draft a README");
    /// assert!(context.context.starts_with("Q:"));
    /// ```
    #[must_use]
    pub fn with_original_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.original_prompt = prompt.into();
        self
    }

    /// Sets the clarifying question/answer context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}
