//! Template service: the entry point that composes catalog, variable engine,
//! chain executor and context adapter.
//!
//! Data flows catalog → variable engine (validate, track, render) → chain
//! executor (for chained templates) → context adapter → executor.

use crate::adapter::{AdaptationOptions, OutputFormat, TargetModel, apply_context_adaptations};
use crate::catalog::{CUSTOM_TEMPLATES_KEY, FAVORITES_KEY, TemplateCatalog};
use crate::chain::{ChainResult, PromptExecutor, execute_chain, execute_validated_chain};
use crate::config::PromptKitConfig;
use crate::error::{PromptKitError, Result};
use crate::history::{HistoryStore, KvHistoryStore, MemoryHistoryStore};
use crate::storage::{self, FileKvStore, KvStore, MemoryKvStore};
use crate::types::{Template, UserTemplateData, VariableContext};
use crate::variables::{DEFAULT_SUGGESTION_LIMIT, VariableEngine};
use serde::Serialize;
use std::future::Future;

/// A fully rendered template ready to be sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTemplate {
    pub template: Template,
    pub rendered_prompt: String,
    pub variables: VariableContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_model: Option<TargetModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    pub token_optimized: bool,
    pub token_count: usize,
    pub savings: usize,
}

/// Executor decorator that adapts every prompt before forwarding it.
#[derive(Debug, Clone)]
pub struct AdaptingExecutor<E> {
    inner: E,
    options: AdaptationOptions,
}

impl<E: PromptExecutor> AdaptingExecutor<E> {
    pub fn new(inner: E, options: AdaptationOptions) -> Self {
        Self { inner, options }
    }

    pub fn options(&self) -> &AdaptationOptions {
        &self.options
    }
}

impl<E: PromptExecutor> PromptExecutor for AdaptingExecutor<E> {
    fn execute(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send {
        let adapted = if self.options.is_noop() {
            prompt.to_string()
        } else {
            apply_context_adaptations(prompt, &self.options).prompt
        };
        async move { self.inner.execute(&adapted).await }
    }
}

/// Orchestrates rendering and chain execution over a template catalog.
#[derive(Debug)]
pub struct TemplateService<S: KvStore, H: HistoryStore> {
    catalog: TemplateCatalog<S>,
    variables: VariableEngine<H>,
    default_adaptation: AdaptationOptions,
    suggestion_limit: usize,
    enforce_validation: bool,
}

impl TemplateService<FileKvStore, KvHistoryStore<FileKvStore>> {
    /// Opens a service persisting to `config.data_dir`, configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogParseError` if the curated catalog is malformed.
    pub fn open(config: &PromptKitConfig) -> Result<Self> {
        let store = FileKvStore::new(&config.data_dir);
        let history = KvHistoryStore::new(store.clone());
        let service = Self::new(TemplateCatalog::new(store)?, VariableEngine::new(history));
        Ok(service.with_config(config))
    }
}

impl TemplateService<MemoryKvStore, MemoryHistoryStore> {
    /// Creates a service that keeps everything in memory.
    ///
    /// # Errors
    ///
    /// Returns `CatalogParseError` if the curated catalog is malformed.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(
            TemplateCatalog::new(MemoryKvStore::new())?,
            VariableEngine::new(MemoryHistoryStore::new()),
        ))
    }
}

impl<S: KvStore, H: HistoryStore> TemplateService<S, H> {
    pub fn new(catalog: TemplateCatalog<S>, variables: VariableEngine<H>) -> Self {
        Self {
            catalog,
            variables,
            default_adaptation: AdaptationOptions::default(),
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            enforce_validation: false,
        }
    }

    /// Applies history, adaptation and chain settings from `config`.
    pub fn with_config(mut self, config: &PromptKitConfig) -> Self {
        self.variables = self.variables.with_max_history(config.history.max_entries);
        self.suggestion_limit = config.history.suggestion_limit;
        self.default_adaptation = config.adaptation;
        self.enforce_validation = config.chain.enforce_validation;
        self
    }

    /// Adaptation used when a call passes no options.
    pub fn with_default_adaptation(mut self, options: AdaptationOptions) -> Self {
        self.default_adaptation = options;
        self
    }

    /// Validate chain dependencies before running chained templates.
    pub fn with_enforced_validation(mut self, enforce: bool) -> Self {
        self.enforce_validation = enforce;
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog<S> {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut TemplateCatalog<S> {
        &mut self.catalog
    }

    pub fn variables(&self) -> &VariableEngine<H> {
        &self.variables
    }

    /// Looks a template up by id.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no curated or custom template has `id`.
    pub fn template(&self, id: &str) -> Result<Template> {
        self.catalog
            .template_by_id(id)
            .ok_or_else(|| PromptKitError::TemplateNotFound(id.to_string()))
    }

    /// Recent values for `name`, capped at `limit` or the configured default.
    pub fn suggestions(&self, name: &str, limit: Option<usize>) -> Vec<String> {
        self.variables
            .get_suggestions(name, limit.unwrap_or(self.suggestion_limit))
    }

    /// Validates, tracks, renders and adapts `template`.
    ///
    /// `options` of `None` falls back to the configured default adaptation.
    ///
    /// # Errors
    ///
    /// Returns `MissingVariables` when a required variable is absent or blank.
    /// Nothing is tracked in that case.
    #[tracing::instrument(skip_all, fields(template = %template.id))]
    pub fn render_full_template(
        &self,
        template: &Template,
        values: &VariableContext,
        options: Option<AdaptationOptions>,
    ) -> Result<RenderedTemplate> {
        self.check_required(template, values)?;
        self.variables.track_all(values);

        let rendered = self.variables.render_template(&template.template, values);
        let options = options.unwrap_or(self.default_adaptation);
        let adaptation = apply_context_adaptations(&rendered, &options);

        tracing::debug!(
            tokens = adaptation.token_count,
            savings = adaptation.savings,
            "rendered template"
        );

        Ok(RenderedTemplate {
            template: template.clone(),
            rendered_prompt: adaptation.prompt,
            variables: values.clone(),
            target_model: options.model,
            output_format: options.format,
            token_optimized: options.optimize_tokens,
            token_count: adaptation.token_count,
            savings: adaptation.savings,
        })
    }

    /// Runs a chained template with `values` as the initial context.
    ///
    /// Every step prompt is adapted with `options` (or the configured
    /// default) before it reaches `executor`. Step failures are reported in
    /// the returned [`ChainResult`], not as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `NoChainSteps` if the template declares no steps, and
    /// `MissingVariables` if required variables are absent or blank.
    #[tracing::instrument(skip_all, fields(template = %template.id))]
    pub async fn run_template_chain<E: PromptExecutor>(
        &self,
        template: &Template,
        values: &VariableContext,
        executor: E,
        options: Option<AdaptationOptions>,
    ) -> Result<ChainResult> {
        let steps = template
            .chain()
            .ok_or_else(|| PromptKitError::NoChainSteps(template.id.clone()))?;
        self.check_required(template, values)?;
        self.variables.track_all(values);

        let executor =
            AdaptingExecutor::new(executor, options.unwrap_or(self.default_adaptation));

        let result = if self.enforce_validation {
            execute_validated_chain(steps, values, &executor).await
        } else {
            execute_chain(steps, values, &executor).await
        };

        tracing::debug!(success = result.success, steps = result.steps.len(), "chain run finished");
        Ok(result)
    }

    /// Snapshot of favorites, custom templates and variable history.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored blob cannot be read or parsed.
    pub fn export_user_data(&self) -> Result<UserTemplateData> {
        let store = self.catalog.store();
        Ok(UserTemplateData {
            favorites: storage::load_json(store, FAVORITES_KEY)?.unwrap_or_default(),
            custom_templates: storage::load_json(store, CUSTOM_TEMPLATES_KEY)?.unwrap_or_default(),
            variable_history: self.variables.variable_history(),
        })
    }

    /// Replaces favorites, custom templates and variable history with `data`.
    ///
    /// Imported templates whose id collides with a curated template are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a store write fails.
    #[tracing::instrument(skip_all)]
    pub fn import_user_data(&self, data: UserTemplateData) -> Result<()> {
        let mut custom_templates = Vec::with_capacity(data.custom_templates.len());
        for mut template in data.custom_templates {
            if self.is_curated(&template.id) {
                tracing::warn!(id = %template.id, "skipping imported template with reserved id");
                continue;
            }
            template.is_custom = true;
            custom_templates.push(template);
        }

        self.catalog.set_favorites(&data.favorites)?;
        self.catalog.set_custom_templates(&custom_templates)?;
        self.variables.replace_variable_history(data.variable_history);

        tracing::debug!(
            favorites = data.favorites.len(),
            custom = custom_templates.len(),
            "imported user data"
        );
        Ok(())
    }

    fn is_curated(&self, id: &str) -> bool {
        crate::catalog::curated_templates()
            .map(|curated| curated.iter().any(|t| t.id == id))
            .unwrap_or(false)
    }

    fn check_required(&self, template: &Template, values: &VariableContext) -> Result<()> {
        let report = self.variables.validate_variables(template, values);
        if report.is_valid {
            Ok(())
        } else {
            Err(PromptKitError::MissingVariables(report.missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FnExecutor;
    use std::sync::{Arc, Mutex};

    fn values(pairs: &[(&str, &str)]) -> VariableContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_full_template_missing_variables() {
        let service = TemplateService::in_memory().unwrap();
        let template = service.template("writing-summarize").unwrap();

        let result = service.render_full_template(&template, &values(&[("text", "hello")]), None);
        match result {
            Err(PromptKitError::MissingVariables(missing)) => {
                assert_eq!(missing, vec!["summaryLength"]);
            }
            other => panic!("expected MissingVariables, got {other:?}"),
        }
        // Failed renders are not tracked.
        assert!(service.suggestions("text", None).is_empty());
    }

    #[test]
    fn test_render_full_template_tracks_and_adapts() {
        let service = TemplateService::in_memory().unwrap();
        let template = service.template("writing-summarize").unwrap();
        let input = values(&[("text", "Rust ownership"), ("summaryLength", "1 paragraph")]);

        let options = AdaptationOptions {
            format: Some(OutputFormat::Markdown),
            ..Default::default()
        };
        let rendered = service
            .render_full_template(&template, &input, Some(options))
            .unwrap();

        assert!(rendered.rendered_prompt.starts_with("Summarize the following text in 1 paragraph."));
        assert!(rendered.rendered_prompt.ends_with(OutputFormat::Markdown.instruction()));
        assert_eq!(rendered.output_format, Some(OutputFormat::Markdown));
        assert!(!rendered.token_optimized);
        assert_eq!(service.suggestions("text", None), vec!["Rust ownership"]);
    }

    #[test]
    fn test_default_adaptation_applies_without_options() {
        let service = TemplateService::in_memory()
            .unwrap()
            .with_default_adaptation(AdaptationOptions {
                model: Some(TargetModel::Llama),
                ..Default::default()
            });
        let template = service.template("writing-summarize").unwrap();
        let input = values(&[("text", "x"), ("summaryLength", "1 paragraph")]);

        let rendered = service.render_full_template(&template, &input, None).unwrap();
        assert!(rendered.rendered_prompt.starts_with("You are a helpful AI assistant."));
        assert_eq!(rendered.target_model, Some(TargetModel::Llama));
    }

    #[tokio::test]
    async fn test_run_template_chain_requires_steps() {
        let service = TemplateService::in_memory().unwrap();
        let template = service.template("coding-code-review").unwrap();
        let executor = FnExecutor::new(|p: String| async move { Ok(p) });

        let result = service
            .run_template_chain(&template, &VariableContext::new(), executor, None)
            .await;
        assert!(matches!(result, Err(PromptKitError::NoChainSteps(id)) if id == "coding-code-review"));
    }

    #[tokio::test]
    async fn test_run_template_chain_adapts_each_step() {
        let service = TemplateService::in_memory().unwrap();
        let template = service.template("writing-article-pipeline").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let executor = FnExecutor::new(move |prompt: String| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().unwrap().push(prompt.clone());
                Ok(format!("[{}]", prompt.len()))
            }
        });

        let options = AdaptationOptions {
            model: Some(TargetModel::Llama),
            ..Default::default()
        };
        let input = values(&[("topic", "borrowing"), ("audience", "new Rustaceans")]);
        let result = service
            .run_template_chain(&template, &input, executor, Some(options))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.steps.len(), 3);
        assert!(result.context.contains_key("article"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|p| p.starts_with("You are a helpful AI assistant. ")));
        assert!(seen[0].contains("borrowing"));
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = TemplateService::in_memory().unwrap();
        source.catalog().add_favorite("coding-bug-fix").unwrap();
        source.variables().track_variable_usage("language", "Rust");
        let mut custom = source.template("coding-bug-fix").unwrap();
        custom.id = "custom-bugs".to_string();
        source.catalog().save_custom_template(custom).unwrap();

        let exported = source.export_user_data().unwrap();

        let target = TemplateService::in_memory().unwrap();
        target.import_user_data(exported.clone()).unwrap();
        assert_eq!(target.export_user_data().unwrap(), exported);
    }

    #[test]
    fn test_import_skips_reserved_ids() {
        let service = TemplateService::in_memory().unwrap();
        let curated = service.template("coding-bug-fix").unwrap();

        service
            .import_user_data(UserTemplateData {
                custom_templates: vec![curated],
                ..Default::default()
            })
            .unwrap();
        assert!(service.catalog().custom_templates().is_empty());
    }
}
