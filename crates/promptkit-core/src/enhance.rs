//! Prompt enhancement flows built on the meta-prompts.
//!
//! *Improve* rewrites a rough prompt in one round trip. *Refine* is two
//! round trips: generate clarifying questions, then enhance the prompt with
//! the user's answers.

use crate::chain::PromptExecutor;
use crate::error::{PromptKitError, Result};
use promptkit_pm::{MetaPrompt, MetaPromptContext, PromptEngine, PromptManager};
use regex::Regex;
use std::sync::LazyLock;

/// Shortest accepted prompt, in characters after trimming.
pub const MIN_PROMPT_LENGTH: usize = 3;

/// Longest accepted prompt, in characters after trimming.
pub const MAX_PROMPT_LENGTH: usize = 10_000;

const MAX_FALLBACK_QUESTIONS: usize = 5;

static JSON_ARRAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("Invalid JSON array regex"));

static LIST_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\-\*\.]+\s*").expect("Invalid list marker regex"));

/// Checks that a prompt is worth sending and returns it trimmed.
///
/// # Errors
///
/// Returns `InvalidPrompt` when the trimmed prompt is shorter than
/// [`MIN_PROMPT_LENGTH`] or longer than [`MAX_PROMPT_LENGTH`].
pub fn validate_prompt(prompt: &str) -> Result<&str> {
    let trimmed = prompt.trim();
    let length = trimmed.chars().count();
    if length < MIN_PROMPT_LENGTH {
        return Err(PromptKitError::InvalidPrompt(format!(
            "Prompt must be at least {MIN_PROMPT_LENGTH} characters"
        )));
    }
    if length > MAX_PROMPT_LENGTH {
        return Err(PromptKitError::InvalidPrompt(format!(
            "Prompt must be less than {MAX_PROMPT_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

/// Extracts clarifying questions from a model response.
///
/// Prefers the first-to-last bracketed JSON array of strings; otherwise uses
/// the non-empty lines with list markers stripped, at most five.
pub fn parse_questions(response: &str) -> Vec<String> {
    let content = response.trim();

    let parsed = JSON_ARRAY_REGEX
        .find(content)
        .and_then(|m| serde_json::from_str::<Vec<String>>(m.as_str()).ok());
    if let Some(questions) = parsed {
        return questions;
    }

    content
        .lines()
        .map(|line| LIST_MARKER_REGEX.replace(line.trim(), "").trim().to_string())
        .filter(|question| !question.is_empty())
        .take(MAX_FALLBACK_QUESTIONS)
        .collect()
}

/// Formats answered questions as `Q:`/`A:` blocks separated by blank lines.
pub fn format_answers(answers: &[(String, String)]) -> String {
    answers
        .iter()
        .map(|(question, answer)| format!("Q: {question}\nA: {answer}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Runs the enhancement meta-prompts through an executor.
#[derive(Debug)]
pub struct Enhancer<'a, E: PromptExecutor> {
    prompts: &'a PromptManager,
    executor: E,
}

impl<'a, E: PromptExecutor> Enhancer<'a, E> {
    pub fn new(prompts: &'a PromptManager, executor: E) -> Self {
        Self { prompts, executor }
    }

    /// One-click enhancement. Returns the trimmed model output.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrompt`, a meta-prompt rendering error, or
    /// `ExecutorFailed`.
    #[tracing::instrument(skip_all)]
    pub async fn enhance_prompt(&self, prompt: &str) -> Result<String> {
        let prompt = validate_prompt(prompt)?;
        let meta = self
            .prompts
            .get_meta_prompt(MetaPrompt::Improve, &MetaPromptContext::new(prompt))?;
        Ok(self.run(&meta).await?.trim().to_string())
    }

    /// Asks the model for clarifying questions about `prompt`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrompt`, a meta-prompt rendering error, or
    /// `ExecutorFailed`.
    #[tracing::instrument(skip_all)]
    pub async fn generate_refine_questions(&self, prompt: &str) -> Result<Vec<String>> {
        let prompt = validate_prompt(prompt)?;
        let meta = self
            .prompts
            .get_meta_prompt(MetaPrompt::RefineQuestions, &MetaPromptContext::new(prompt))?;
        let questions = parse_questions(&self.run(&meta).await?);
        tracing::debug!(count = questions.len(), "parsed refine questions");
        Ok(questions)
    }

    /// Enhances `original` using answered clarifying questions, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrompt`, a meta-prompt rendering error, or
    /// `ExecutorFailed`.
    #[tracing::instrument(skip_all, fields(answers = answers.len()))]
    pub async fn enhance_with_context(
        &self,
        original: &str,
        answers: &[(String, String)],
    ) -> Result<String> {
        let original = validate_prompt(original)?;
        let context = MetaPromptContext::default()
            .with_original_prompt(original)
            .with_context(format_answers(answers));
        let meta = self
            .prompts
            .get_meta_prompt(MetaPrompt::RefineEnhance, &context)?;
        Ok(self.run(&meta).await?.trim().to_string())
    }

    async fn run(&self, meta: &str) -> Result<String> {
        self.executor
            .execute(meta)
            .await
            .map_err(|e| PromptKitError::ExecutorFailed(format!("{e:#}")))
    }
}
