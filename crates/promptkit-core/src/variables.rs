//! Variable engine: `{name}` placeholder extraction, rendering, and validation.
//!
//! Rendering follows a partial-render policy: a placeholder whose name has no
//! entry in the value map is left in the output verbatim, so a template can be
//! rendered repeatedly while a form is still being filled in. An explicit
//! empty string *is* an entry and replaces the placeholder.
//!
//! None of the operations here fail. Missing data shows up as empty results
//! or as a [`ValidationReport`] listing what is missing.

use crate::history::{HistoryStore, MAX_HISTORY_ITEMS};
use crate::types::{
    Template, ValidationReport, VariableContext, VariableDefinition, VariableHistory, VariableType,
};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Default number of suggestions returned by [`VariableEngine::get_suggestions`].
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("Invalid variable regex"));

/// Extracts the distinct placeholder names of a template, in order of first appearance.
///
/// # Examples
///
/// ```
/// use promptkit_core::variables::extract_variables;
///
/// let names = extract_variables("Review this {language} code: {code}. Use {language} idioms.");
/// assert_eq!(names, vec!["language", "code"]);
/// ```
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    VARIABLE_REGEX
        .captures_iter(template)
        .filter_map(|caps| {
            let name = &caps[1];
            seen.insert(name.to_string()).then(|| name.to_string())
        })
        .collect()
}

/// Renders a template by substituting every placeholder whose name is present in `values`.
///
/// Placeholders without a value are left untouched. Substituted text is not
/// scanned again, so a value containing `{other}` stays literal.
///
/// # Examples
///
/// ```
/// use promptkit_core::variables::render_template;
/// use std::collections::HashMap;
///
/// let mut values = HashMap::new();
/// values.insert("name".to_string(), "John".to_string());
///
/// let rendered = render_template("Hello, {name}! Your role is {role}.", &values);
/// assert_eq!(rendered, "Hello, John! Your role is {role}.");
/// ```
pub fn render_template<S>(template: &str, values: &HashMap<String, String, S>) -> String
where
    S: std::hash::BuildHasher,
{
    VARIABLE_REGEX
        .replace_all(template, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Checks that every required variable of `template` has a non-blank value.
///
/// Optional variables never fail validation, even when empty.
pub fn validate_variables(template: &Template, values: &VariableContext) -> ValidationReport {
    let missing: Vec<String> = template
        .variables
        .iter()
        .filter(|variable| variable.required)
        .filter(|variable| {
            values
                .get(&variable.name)
                .is_none_or(|value| value.trim().is_empty())
        })
        .map(|variable| variable.name.clone())
        .collect();

    ValidationReport {
        is_valid: missing.is_empty(),
        missing,
    }
}

/// Derives one free-text, required definition per placeholder of `template`.
pub fn create_variable_definitions(template: &str) -> Vec<VariableDefinition> {
    extract_variables(template)
        .into_iter()
        .map(|name| {
            let label = format_variable_label(&name);
            VariableDefinition {
                placeholder: Some(format!("Enter {}...", label.to_lowercase())),
                label,
                name,
                kind: VariableType::Text,
                required: true,
                default_value: None,
                options: None,
                suggestions: None,
            }
        })
        .collect()
}

/// Turns a camelCase or snake_case name into a human-readable label.
///
/// # Examples
///
/// ```
/// use promptkit_core::variables::format_variable_label;
///
/// assert_eq!(format_variable_label("targetAudience"), "Target Audience");
/// assert_eq!(format_variable_label("error_message"), "Error message");
/// ```
pub fn format_variable_label(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        match ch {
            '_' => spaced.push(' '),
            c if c.is_ascii_uppercase() => {
                spaced.push(' ');
                spaced.push(c);
            }
            c => spaced.push(c),
        }
    }

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Variable engine bound to a usage history store.
///
/// The pure rendering functions of this module are re-exposed as methods so
/// callers holding an engine do not need a second import path.
#[derive(Debug)]
pub struct VariableEngine<H: HistoryStore> {
    history: H,
    max_history: usize,
}

impl<H: HistoryStore> VariableEngine<H> {
    /// Creates an engine that remembers up to [`MAX_HISTORY_ITEMS`] values per name.
    pub fn new(history: H) -> Self {
        Self {
            history,
            max_history: MAX_HISTORY_ITEMS,
        }
    }

    /// Overrides the number of remembered values per name (at least one).
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    /// Returns the underlying history store.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// See [`extract_variables`].
    pub fn extract_variables(&self, template: &str) -> Vec<String> {
        extract_variables(template)
    }

    /// See [`render_template`].
    pub fn render_template(&self, template: &str, values: &VariableContext) -> String {
        render_template(template, values)
    }

    /// See [`validate_variables`].
    pub fn validate_variables(&self, template: &Template, values: &VariableContext) -> ValidationReport {
        validate_variables(template, values)
    }

    /// See [`create_variable_definitions`].
    pub fn create_variable_definitions(&self, template: &str) -> Vec<VariableDefinition> {
        create_variable_definitions(template)
    }

    /// Records that `value` was used for `name`. Blank values are ignored.
    pub fn track_variable_usage(&self, name: &str, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        self.history.record(name, value, self.max_history);
    }

    /// Records every entry of `values`.
    pub fn track_all(&self, values: &VariableContext) {
        for (name, value) in values {
            self.track_variable_usage(name, value);
        }
    }

    /// Returns up to `limit` most recent values recorded for `name`.
    pub fn get_suggestions(&self, name: &str, limit: usize) -> Vec<String> {
        let mut suggestions = self.history.get(name);
        suggestions.truncate(limit);
        suggestions
    }

    /// Returns the complete usage history.
    pub fn variable_history(&self) -> VariableHistory {
        self.history.snapshot()
    }

    /// Replaces the complete usage history, trimming each list to the engine's cap.
    pub fn replace_variable_history(&self, mut history: VariableHistory) {
        for entries in history.values_mut() {
            entries.truncate(self.max_history);
        }
        self.history.replace(history);
    }

    /// Forgets all recorded values.
    pub fn clear_variable_history(&self) {
        self.history.clear();
    }
}
