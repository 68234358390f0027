//! Meta-prompt manager implementation using minijinja.

use crate::{
    engine::{MetaPrompt, PromptEngine},
    error::{PromptError, Result},
};
use serde::Serialize;
use std::path::PathBuf;

const TEMPLATE_EXT: &str = "j2";

/// Returns the embedded source of a built-in template, keyed by file name.
fn builtin_source(file_name: &str) -> Option<&'static str> {
    match file_name {
        "improve.j2" => Some(include_str!("../templates/improve.j2")),
        "refine_questions.j2" => Some(include_str!("../templates/refine_questions.j2")),
        "refine_enhance.j2" => Some(include_str!("../templates/refine_enhance.j2")),
        _ => None,
    }
}

/// Manager for loading and rendering meta-prompt templates.
///
/// `PromptManager` wraps the minijinja template engine. The three built-in
/// meta-prompts are always available; an optional override directory may
/// shadow them or add new `.j2` templates.
///
/// # Examples
///
/// ```
/// use promptkit_pm::{MetaPrompt, MetaPromptContext, PromptEngine, PromptManager};
///
/// let manager = PromptManager::builtin();
/// let prompt = manager.get_meta_prompt(
///     MetaPrompt::RefineQuestions,
///     &MetaPromptContext::new("plan a trip"),
/// )?;
/// assert!(prompt.contains("\"plan a trip\""));
/// # Ok::<(), promptkit_pm::PromptError>(())
/// ```
#[derive(Debug)]
pub struct PromptManager {
    /// Optional directory whose templates take precedence over the built-ins.
    pub templates_dir: Option<PathBuf>,
    /// Minijinja environment for template rendering.
    env: minijinja::Environment<'static>,
}

impl PromptManager {
    /// Creates a manager serving only the embedded meta-prompts.
    pub fn builtin() -> Self {
        let mut env = minijinja::Environment::new();
        env.set_loader(|name| Ok(builtin_source(name).map(str::to_owned)));

        Self {
            templates_dir: None,
            env,
        }
    }

    /// Creates a manager that looks up templates in `templates_dir` first and
    /// falls back to the embedded meta-prompts.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or is not a directory.
    pub fn with_overrides(templates_dir: PathBuf) -> Result<Self> {
        if !templates_dir.is_dir() {
            return Err(PromptError::TemplateDirectoryNotFound(templates_dir));
        }

        let dir_loader = minijinja::path_loader(&templates_dir);
        let mut env = minijinja::Environment::new();
        env.set_loader(move |name| match dir_loader(name)? {
            Some(source) => Ok(Some(source)),
            None => Ok(builtin_source(name).map(str::to_owned)),
        });

        Ok(Self {
            templates_dir: Some(templates_dir),
            env,
        })
    }

    /// Tries each candidate directory in order and falls back to the
    /// built-ins when none of them exists.
    pub fn discover<I>(dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        dirs.into_iter()
            .filter(|dir| dir.is_dir())
            .find_map(|dir| Self::with_overrides(dir).ok())
            .unwrap_or_else(Self::builtin)
    }

    fn load_template(&self, name: &str) -> Result<minijinja::Template<'_, '_>> {
        let template_name = format!("{name}.{TEMPLATE_EXT}");
        self.env
            .get_template(&template_name)
            .map_err(|e| PromptError::TemplateNotFound(format!("{name}: {e}")))
    }
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptEngine for PromptManager {
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String> {
        let tmpl = self.load_template(template)?;
        tmpl.render(ctx)
            .map_err(|e| PromptError::TemplateRenderError(format!("{template}: {e}")))
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        let mut templates: Vec<String> = MetaPrompt::ALL
            .iter()
            .map(|kind| kind.template_name().to_string())
            .collect();

        if let Some(dir) = &self.templates_dir {
            let entries = std::fs::read_dir(dir).map_err(|source| {
                PromptError::TemplateListError {
                    path: dir.clone(),
                    source,
                }
            })?;

            for entry in entries {
                let entry = entry.map_err(|source| PromptError::TemplateListError {
                    path: dir.clone(),
                    source,
                })?;

                let path = entry.path();

                if path.is_file()
                    && let Some(ext) = path.extension()
                    && ext == TEMPLATE_EXT
                    && let Some(name) = path.file_stem()
                    && let Some(name_str) = name.to_str()
                {
                    templates.push(name_str.to_string());
                }
            }
        }

        templates.sort();
        templates.dedup();
        Ok(templates)
    }
}
