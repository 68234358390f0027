//! Context adapter: final-mile adaptation of a rendered prompt.
//!
//! Adaptations are applied in a fixed order by [`apply_context_adaptations`]:
//! token optimization, then output-format instructions, then the model
//! prefix. Optimizing first keeps the appended instruction text out of reach
//! of the redundant-phrase filter.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

static REDUNDANT_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)please\s+",
        r"(?i)I would like you to\s+",
        r"(?i)Could you please\s+",
        r"(?i)I want you to\s+",
        r"(?i)Can you\s+",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid redundant phrase regex"))
    .collect()
});

/// Target text-generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetModel {
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "llama")]
    Llama,
}

impl TargetModel {
    /// All supported models.
    pub const ALL: [TargetModel; 5] = [
        TargetModel::Gpt4,
        TargetModel::Gpt4oMini,
        TargetModel::Claude,
        TargetModel::Gemini,
        TargetModel::Llama,
    ];

    /// Returns the wire name of the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetModel::Gpt4 => "gpt-4",
            TargetModel::Gpt4oMini => "gpt-4o-mini",
            TargetModel::Claude => "claude",
            TargetModel::Gemini => "gemini",
            TargetModel::Llama => "llama",
        }
    }

    /// System-style prefix for models that need explicit assistant framing.
    pub fn prefix(&self) -> &'static str {
        match self {
            TargetModel::Llama => "You are a helpful AI assistant. ",
            TargetModel::Gpt4 | TargetModel::Gpt4oMini | TargetModel::Claude | TargetModel::Gemini => "",
        }
    }
}

impl fmt::Display for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetModel::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid model: {}", s))
    }
}

/// Requested output format of the generated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text; no instruction is appended.
    Text,
    /// Structured markup.
    Markdown,
    /// Strict data only.
    Json,
    /// Bare code without commentary fences.
    Code,
}

impl OutputFormat {
    /// All supported formats.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Text,
        OutputFormat::Markdown,
        OutputFormat::Json,
        OutputFormat::Code,
    ];

    /// Returns the wire name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Code => "code",
        }
    }

    /// Instruction suffix appended to prompts requesting this format.
    pub fn instruction(&self) -> &'static str {
        match self {
            OutputFormat::Text => "",
            OutputFormat::Markdown => {
                "\n\nFormat your response using Markdown with headers, lists, and code blocks where appropriate."
            }
            OutputFormat::Json => {
                "\n\nRespond ONLY with valid JSON. Do not include any text before or after the JSON object."
            }
            OutputFormat::Code => {
                "\n\nRespond with code only. Include comments for explanation. Do not include markdown code fences."
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid format: {}", s))
    }
}

/// Which adaptations to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationOptions {
    pub model: Option<TargetModel>,
    pub format: Option<OutputFormat>,
    pub optimize_tokens: bool,
}

impl AdaptationOptions {
    /// True when no adaptation would change the prompt.
    pub fn is_noop(&self) -> bool {
        self.model.is_none() && self.format.is_none() && !self.optimize_tokens
    }
}

/// Adapted prompt together with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Adaptation {
    pub prompt: String,
    pub token_count: usize,
    pub savings: usize,
}

/// Estimates the token count of `text` as one token per four characters, rounded up.
///
/// This is a rough heuristic for English prose, not a provider tokenizer;
/// use it for budgeting and comparisons only.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Shrinks a prompt without changing its substance.
///
/// Collapses whitespace runs, strips polite filler phrases wherever they
/// occur (case-insensitive), trims, and uppercases the first character.
/// The whole pass repeats until the text stops changing, so capitalizing
/// the first character can never expose a phrase for a later call to strip.
///
/// Uppercasing may lengthen the text (`ß` becomes `SS`), so the result is
/// not guaranteed to estimate fewer tokens than the input.
///
/// # Examples
///
/// ```
/// use promptkit_core::adapter::optimize_tokens;
///
/// assert_eq!(optimize_tokens("  could you please   explain traits?"), "Could you explain traits?");
/// assert_eq!(optimize_tokens("I want you to list three crates"), "List three crates");
/// ```
pub fn optimize_tokens(text: &str) -> String {
    let mut current = optimize_pass(text);

    loop {
        let next = optimize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn optimize_pass(text: &str) -> String {
    let mut next = WHITESPACE_REGEX.replace_all(text, " ").into_owned();
    for phrase in REDUNDANT_PHRASES.iter() {
        next = phrase.replace_all(&next, "").into_owned();
    }
    next = WHITESPACE_REGEX.replace_all(&next, " ").into_owned();

    let trimmed = next.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Appends the instruction for `format` (nothing for plain text).
pub fn add_format_instructions(text: &str, format: OutputFormat) -> String {
    format!("{text}{}", format.instruction())
}

/// Prepends the prefix for `model` (nothing for models without one).
pub fn adapt_for_model(text: &str, model: TargetModel) -> String {
    format!("{}{text}", model.prefix())
}

/// Applies the requested adaptations in order: optimize, format, model.
///
/// `savings` is the estimated token reduction relative to the input and is
/// never negative; appended instructions can make it zero.
pub fn apply_context_adaptations(text: &str, options: &AdaptationOptions) -> Adaptation {
    let original_tokens = estimate_tokens(text);

    let mut adapted = if options.optimize_tokens {
        optimize_tokens(text)
    } else {
        text.to_string()
    };

    if let Some(format) = options.format {
        adapted = add_format_instructions(&adapted, format);
    }

    if let Some(model) = options.model {
        adapted = adapt_for_model(&adapted, model);
    }

    let token_count = estimate_tokens(&adapted);

    Adaptation {
        prompt: adapted,
        token_count,
        savings: original_tokens.saturating_sub(token_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn test_optimize_collapses_whitespace_and_capitalizes() {
        assert_eq!(optimize_tokens("  write\n\n a   test\t"), "Write a test");
        assert_eq!(optimize_tokens("   "), "");
        assert_eq!(optimize_tokens(""), "");
    }

    #[test]
    fn test_optimize_strips_phrases_case_insensitively() {
        assert_eq!(
            optimize_tokens("PLEASE summarize. Can you also list sources? please be brief"),
            "Summarize. also list sources? be brief"
        );
        assert_eq!(
            optimize_tokens("I would like you to draft an email"),
            "Draft an email"
        );
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let samples = [
            "Please can you help me with this?",
            "plecan you ase fix it",
            "I want please you to review",
            "  Could   you please   please  write  ",
            "can you",
            "ßtraße please ",
            "nothing to strip here",
            "ı want you to write tests",
        ];

        for sample in samples {
            let once = optimize_tokens(sample);
            assert_eq!(optimize_tokens(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_optimize_strips_phrase_exposed_by_capitalization() {
        // Dotless i only matches the phrase once uppercased.
        assert_eq!(optimize_tokens("ı want you to write tests"), "Write tests");
    }

    #[test]
    fn test_format_instructions() {
        assert_eq!(add_format_instructions("List", OutputFormat::Text), "List");
        assert!(add_format_instructions("List", OutputFormat::Json).contains("valid JSON"));
        assert!(add_format_instructions("List", OutputFormat::Markdown).contains("Markdown"));
        assert!(add_format_instructions("List", OutputFormat::Code).contains("code only"));
    }

    #[test]
    fn test_adapt_for_model() {
        assert_eq!(adapt_for_model("Test prompt", TargetModel::Gpt4), "Test prompt");
        assert_eq!(
            adapt_for_model("Test prompt", TargetModel::Llama),
            "You are a helpful AI assistant. Test prompt"
        );
    }

    #[test]
    fn test_apply_with_no_options_is_identity() {
        let result = apply_context_adaptations("Test prompt", &AdaptationOptions::default());
        assert_eq!(result.prompt, "Test prompt");
        assert_eq!(result.token_count, estimate_tokens("Test prompt"));
        assert_eq!(result.savings, 0);
    }

    #[test]
    fn test_apply_order_keeps_instruction_intact() {
        let options = AdaptationOptions {
            model: Some(TargetModel::Llama),
            format: Some(OutputFormat::Code),
            optimize_tokens: true,
        };
        let result = apply_context_adaptations("please   write a parser", &options);

        assert!(result.prompt.starts_with("You are a helpful AI assistant. Write a parser"));
        assert!(result.prompt.ends_with(OutputFormat::Code.instruction()));
    }

    #[test]
    fn test_optimization_reports_savings() {
        let text = "Could you please   I would like you to   summarize this report";
        let options = AdaptationOptions {
            optimize_tokens: true,
            ..Default::default()
        };
        let result = apply_context_adaptations(text, &options);

        assert!(result.token_count <= estimate_tokens(text));
        assert_eq!(result.savings, estimate_tokens(text) - result.token_count);
        assert!(result.savings > 0);
    }

    #[test]
    fn test_savings_clamped_when_instructions_grow_prompt() {
        let options = AdaptationOptions {
            format: Some(OutputFormat::Json),
            ..Default::default()
        };
        let result = apply_context_adaptations("List items", &options);
        assert_eq!(result.savings, 0);
        assert!(result.token_count > estimate_tokens("List items"));
    }

    #[test]
    fn test_enums_parse_wire_names() {
        for model in TargetModel::ALL {
            assert_eq!(model.as_str().parse::<TargetModel>(), Ok(model));
        }
        for format in OutputFormat::ALL {
            assert_eq!(format.as_str().parse::<OutputFormat>(), Ok(format));
        }
        assert!("gpt-5".parse::<TargetModel>().is_err());
        assert_eq!(serde_json::to_string(&TargetModel::Gpt4oMini).unwrap(), "\"gpt-4o-mini\"");
    }
}
