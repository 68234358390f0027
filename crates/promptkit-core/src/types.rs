//! Shared data model for templates, variables, and chains.
//!
//! All types serialize with camelCase field names so persisted blobs and
//! catalog files keep the same JSON shape across versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Mapping from variable name to value, accumulated during rendering and chain runs.
pub type VariableContext = HashMap<String, String>;

/// Most-recently-used values per variable name, most recent first.
pub type VariableHistory = HashMap<String, Vec<String>>;

/// Category tag used to group catalog templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Coding,
    Writing,
    Marketing,
    Productivity,
    Creative,
}

impl TemplateCategory {
    /// All categories, in display order.
    pub const ALL: [TemplateCategory; 5] = [
        TemplateCategory::Coding,
        TemplateCategory::Writing,
        TemplateCategory::Marketing,
        TemplateCategory::Productivity,
        TemplateCategory::Creative,
    ];

    /// Returns the wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Coding => "coding",
            TemplateCategory::Writing => "writing",
            TemplateCategory::Marketing => "marketing",
            TemplateCategory::Productivity => "productivity",
            TemplateCategory::Creative => "creative",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid category: {}", s))
    }
}

/// Input widget kind for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Single-line free text.
    #[default]
    Text,
    /// Multi-line free text.
    Textarea,
    /// One of an enumerated list of options.
    Select,
    /// Numeric input.
    Number,
}

/// Declaration of one `{name}` placeholder of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    /// Variable name (used in the template as `{name}`).
    pub name: String,

    /// Display label for forms.
    pub label: String,

    /// Input type.
    #[serde(rename = "type", default)]
    pub kind: VariableType,

    /// Placeholder text for an empty input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Whether a non-blank value is needed for a full render.
    #[serde(default)]
    pub required: bool,

    /// Value pre-filled in forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    /// Allowed values for [`VariableType::Select`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Static suggestions shown alongside the usage history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// One step of a multi-step prompt chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    /// Unique step id.
    pub id: String,

    /// Execution order. Steps run by ascending `order`, not by position.
    pub order: i64,

    /// Step title.
    pub name: String,

    /// Sub-template rendered against the chain context.
    pub prompt: String,

    /// Context key the step output is stored under. Empty means "not stored".
    #[serde(default)]
    pub output_variable: String,

    /// Context keys that must exist before this step runs.
    #[serde(default)]
    pub input_variables: Vec<String>,
}

/// A catalog template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: TemplateCategory,

    /// Template body with `{variable}` placeholders.
    pub template: String,

    #[serde(default)]
    pub variables: Vec<VariableDefinition>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Multi-step composition, if the template defines one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_steps: Option<Vec<ChainStep>>,

    /// Set for user-authored templates.
    #[serde(default)]
    pub is_custom: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Template {
    /// Looks up a variable definition by name.
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Returns the names declared more than once, in order of first repetition.
    pub fn duplicate_variable_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for variable in &self.variables {
            if !seen.insert(variable.name.as_str()) && !duplicates.contains(&variable.name) {
                duplicates.push(variable.name.clone());
            }
        }
        duplicates
    }

    /// Returns the chain steps, if any are declared.
    pub fn chain(&self) -> Option<&[ChainStep]> {
        self.chain_steps.as_deref().filter(|steps| !steps.is_empty())
    }

    /// Values pre-filled from each definition's `default_value`.
    pub fn default_values(&self) -> VariableContext {
        self.variables
            .iter()
            .filter_map(|v| {
                v.default_value
                    .as_ref()
                    .map(|value| (v.name.clone(), value.clone()))
            })
            .collect()
    }
}

/// Outcome of checking a value map against a template's required variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub missing: Vec<String>,
}

/// Favorites, custom templates, and history bundled for backup or sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTemplateData {
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub custom_templates: Vec<Template>,
    #[serde(default)]
    pub variable_history: VariableHistory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            label: name.to_string(),
            kind: VariableType::Text,
            placeholder: None,
            required: true,
            default_value: None,
            options: None,
            suggestions: None,
        }
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in TemplateCategory::ALL {
            assert_eq!(category.as_str().parse::<TemplateCategory>(), Ok(category));
        }
        assert_eq!("Coding".parse::<TemplateCategory>(), Ok(TemplateCategory::Coding));
        assert!("cooking".parse::<TemplateCategory>().is_err());
    }

    #[test]
    fn test_duplicate_variable_names() {
        let template = Template {
            id: "t".to_string(),
            name: "T".to_string(),
            description: String::new(),
            category: TemplateCategory::Writing,
            template: "{a} {b}".to_string(),
            variables: vec![variable("a"), variable("b"), variable("a"), variable("a")],
            tags: Vec::new(),
            chain_steps: None,
            is_custom: false,
            created_at: None,
            updated_at: None,
        };

        assert_eq!(template.duplicate_variable_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_variable_definition_uses_type_key() {
        let json = r#"{"name":"code","label":"Code","type":"textarea","required":true}"#;
        let definition: VariableDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.kind, VariableType::Textarea);

        let back = serde_json::to_value(&definition).unwrap();
        assert_eq!(back["type"], "textarea");
        assert!(back.get("defaultValue").is_none());
    }

    #[test]
    fn test_empty_chain_is_treated_as_absent() {
        let json = r#"{"id":"t","name":"T","category":"creative","template":"x","chainSteps":[]}"#;
        let template: Template = serde_json::from_str(json).unwrap();
        assert!(template.chain().is_none());
    }
}
