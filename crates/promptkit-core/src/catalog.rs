//! Template catalog: curated templates, user templates and favorites.
//!
//! Curated templates are compiled into the binary from `catalog/curated.toml`
//! and parsed on first use. User-authored templates and the favorites list
//! are JSON blobs in a [`KvStore`]; a blob that cannot be read is logged and
//! treated as empty.

use crate::error::{PromptKitError, Result};
use crate::storage::{self, KvStore};
use crate::types::{Template, TemplateCategory};
use chrono::Utc;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};

/// Storage key for the list of favorite template ids.
pub const FAVORITES_KEY: &str = "favorites";

/// Storage key for the list of user-authored templates.
pub const CUSTOM_TEMPLATES_KEY: &str = "custom-templates";

const CURATED_SOURCE: &str = include_str!("../catalog/curated.toml");

#[derive(Deserialize)]
struct CuratedFile {
    templates: Vec<Template>,
}

static CURATED: LazyLock<std::result::Result<Vec<Template>, String>> = LazyLock::new(|| {
    toml::from_str::<CuratedFile>(CURATED_SOURCE)
        .map(|file| file.templates)
        .map_err(|e| e.to_string())
});

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns the curated templates shipped with the crate.
///
/// # Errors
///
/// Returns `CatalogParseError` if the embedded catalog is malformed.
pub fn curated_templates() -> Result<&'static [Template]> {
    CURATED
        .as_deref()
        .map_err(|e| PromptKitError::CatalogParseError(e.clone()))
}

/// Generates a fresh id for a user-authored template.
///
/// Ids look like `custom-<unix millis>-<base36 counter>` and are unique
/// within the process.
pub fn generate_template_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let sequence = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("custom-{millis}-{}", to_base36(sequence))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Curated and user templates backed by a key-value store.
#[derive(Debug)]
pub struct TemplateCatalog<S: KvStore> {
    store: S,
    curated: &'static [Template],
    lock: Mutex<()>,
}

impl<S: KvStore> TemplateCatalog<S> {
    /// Creates a catalog over `store`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogParseError` if the embedded curated catalog is malformed.
    pub fn new(store: S) -> Result<Self> {
        Ok(Self {
            store,
            curated: curated_templates()?,
            lock: Mutex::new(()),
        })
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Curated templates followed by custom ones.
    pub fn all_templates(&self) -> Vec<Template> {
        let mut templates = self.curated.to_vec();
        templates.extend(self.custom_templates());
        templates
    }

    pub fn templates_by_category(&self, category: TemplateCategory) -> Vec<Template> {
        self.all_templates()
            .into_iter()
            .filter(|t| t.category == category)
            .collect()
    }

    pub fn template_by_id(&self, id: &str) -> Option<Template> {
        self.curated
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .or_else(|| self.custom_templates().into_iter().find(|t| t.id == id))
    }

    /// Case-insensitive substring search over name, description and tags.
    pub fn search_templates(&self, query: &str) -> Vec<Template> {
        let query = query.to_lowercase();
        self.all_templates()
            .into_iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&query)
                    || t.description.to_lowercase().contains(&query)
                    || t.tags.iter().any(|tag| tag.to_lowercase().contains(&query))
            })
            .collect()
    }

    // Favorites

    pub fn favorites(&self) -> Vec<String> {
        storage::load_json_or_default(&self.store, FAVORITES_KEY)
    }

    /// Adds `id` to the favorites. Adding an existing favorite is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn add_favorite(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut favorites = self.favorites();
        if favorites.iter().any(|f| f == id) {
            return Ok(());
        }
        favorites.push(id.to_string());
        storage::save_json(&self.store, FAVORITES_KEY, &favorites)
    }

    /// Removes `id` from the favorites.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn remove_favorite(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut favorites = self.favorites();
        favorites.retain(|f| f != id);
        storage::save_json(&self.store, FAVORITES_KEY, &favorites)
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites().iter().any(|f| f == id)
    }

    /// Favorite templates in catalog order. Ids that no longer resolve are skipped.
    pub fn favorite_templates(&self) -> Vec<Template> {
        let favorites = self.favorites();
        self.all_templates()
            .into_iter()
            .filter(|t| favorites.contains(&t.id))
            .collect()
    }

    /// Replaces the whole favorites list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn set_favorites(&self, favorites: &[String]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        storage::save_json(&self.store, FAVORITES_KEY, favorites)
    }

    // Custom templates

    pub fn custom_templates(&self) -> Vec<Template> {
        storage::load_json_or_default(&self.store, CUSTOM_TEMPLATES_KEY)
    }

    /// Inserts or updates a user-authored template and returns the stored copy.
    ///
    /// The stored copy is marked custom and stamped with `updated_at`; an
    /// update keeps the original `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `ReservedTemplateId` if `template.id` belongs to a curated
    /// template, `DuplicateVariables` if a variable name is declared twice,
    /// or a storage error.
    #[tracing::instrument(skip_all, fields(id = %template.id))]
    pub fn save_custom_template(&self, mut template: Template) -> Result<Template> {
        if self.curated.iter().any(|t| t.id == template.id) {
            return Err(PromptKitError::ReservedTemplateId(template.id));
        }
        let duplicates = template.duplicate_variable_names();
        if !duplicates.is_empty() {
            return Err(PromptKitError::DuplicateVariables {
                id: template.id,
                names: duplicates,
            });
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut templates = self.custom_templates();
        let now = Utc::now();
        template.is_custom = true;
        template.updated_at = Some(now);

        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => {
                template.created_at = existing.created_at.or(Some(now));
                *existing = template.clone();
                tracing::debug!("updated custom template");
            }
            None => {
                template.created_at = Some(now);
                templates.push(template.clone());
                tracing::debug!("created custom template");
            }
        }

        storage::save_json(&self.store, CUSTOM_TEMPLATES_KEY, &templates)?;
        Ok(template)
    }

    /// Deletes a user-authored template, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn delete_custom_template(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut templates = self.custom_templates();
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        storage::save_json(&self.store, CUSTOM_TEMPLATES_KEY, &templates)?;
        Ok(true)
    }

    /// Replaces the whole list of user-authored templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn set_custom_templates(&self, templates: &[Template]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        storage::save_json(&self.store, CUSTOM_TEMPLATES_KEY, templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::types::VariableDefinition;
    use crate::variables::extract_variables;

    fn custom(id: &str) -> Template {
        Template {
            id: id.to_string(),
            name: "Standup".to_string(),
            description: "Daily standup notes".to_string(),
            category: TemplateCategory::Productivity,
            template: "Yesterday: {yesterday}".to_string(),
            variables: vec![VariableDefinition {
                name: "yesterday".to_string(),
                label: "Yesterday".to_string(),
                kind: Default::default(),
                placeholder: None,
                required: true,
                default_value: None,
                options: None,
                suggestions: None,
            }],
            tags: vec!["meetings".to_string()],
            chain_steps: None,
            is_custom: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_curated_catalog_parses() {
        let curated = curated_templates().unwrap();
        for category in TemplateCategory::ALL {
            assert!(
                curated.iter().any(|t| t.category == category),
                "no curated template for {category}"
            );
        }
        assert!(curated.iter().any(|t| t.chain().is_some()));
        assert!(curated.iter().all(|t| !t.is_custom));
    }

    #[test]
    fn test_curated_variables_are_declared() {
        for template in curated_templates().unwrap() {
            assert!(template.duplicate_variable_names().is_empty(), "{}", template.id);
            for name in extract_variables(&template.template) {
                assert!(
                    template.variable(&name).is_some(),
                    "{} uses undeclared {name}",
                    template.id
                );
            }
        }
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = TemplateCatalog::new(MemoryKvStore::new()).unwrap();
        let results = catalog.search_templates("DEBUG");
        assert!(results.iter().any(|t| t.id == "coding-bug-fix"));
        assert!(catalog.search_templates("no such template anywhere").is_empty());
    }

    #[test]
    fn test_favorites_lifecycle() {
        let catalog = TemplateCatalog::new(MemoryKvStore::new()).unwrap();
        catalog.add_favorite("coding-code-review").unwrap();
        catalog.add_favorite("coding-code-review").unwrap();
        catalog.add_favorite("missing-id").unwrap();

        assert_eq!(catalog.favorites().len(), 2);
        assert!(catalog.is_favorite("coding-code-review"));

        let templates = catalog.favorite_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].id, "coding-code-review");

        catalog.remove_favorite("coding-code-review").unwrap();
        assert!(!catalog.is_favorite("coding-code-review"));
    }

    #[test]
    fn test_save_custom_template_stamps_and_updates() {
        let catalog = TemplateCatalog::new(MemoryKvStore::new()).unwrap();

        let saved = catalog.save_custom_template(custom("custom-1")).unwrap();
        assert!(saved.is_custom);
        let created_at = saved.created_at.unwrap();
        assert!(saved.updated_at.is_some());

        let mut edited = custom("custom-1");
        edited.name = "Standup v2".to_string();
        let updated = catalog.save_custom_template(edited).unwrap();
        assert_eq!(updated.created_at, Some(created_at));

        let templates = catalog.custom_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Standup v2");
        assert_eq!(
            catalog.all_templates().last().map(|t| t.id.as_str()),
            Some("custom-1")
        );
        assert_eq!(
            catalog.template_by_id("custom-1").map(|t| t.name),
            Some("Standup v2".to_string())
        );
    }

    #[test]
    fn test_save_custom_template_rejects_invalid() {
        let catalog = TemplateCatalog::new(MemoryKvStore::new()).unwrap();

        let result = catalog.save_custom_template(custom("coding-code-review"));
        assert!(matches!(result, Err(PromptKitError::ReservedTemplateId(_))));

        let mut duplicated = custom("custom-2");
        duplicated.variables.push(duplicated.variables[0].clone());
        let result = catalog.save_custom_template(duplicated);
        assert!(matches!(
            result,
            Err(PromptKitError::DuplicateVariables { ref names, .. }) if names == &["yesterday"]
        ));
        assert!(catalog.custom_templates().is_empty());
    }

    #[test]
    fn test_delete_custom_template() {
        let catalog = TemplateCatalog::new(MemoryKvStore::new()).unwrap();
        catalog.save_custom_template(custom("custom-3")).unwrap();

        assert!(catalog.delete_custom_template("custom-3").unwrap());
        assert!(!catalog.delete_custom_template("custom-3").unwrap());
        assert!(catalog.template_by_id("custom-3").is_none());
    }

    #[test]
    fn test_corrupt_custom_blob_is_treated_as_empty() {
        let store = MemoryKvStore::new();
        store.set(CUSTOM_TEMPLATES_KEY, "{broken").unwrap();
        let catalog = TemplateCatalog::new(store).unwrap();

        assert!(catalog.custom_templates().is_empty());
        assert_eq!(catalog.all_templates().len(), curated_templates().unwrap().len());
    }

    #[test]
    fn test_generate_template_id_is_unique() {
        let a = generate_template_id();
        let b = generate_template_id();
        assert!(a.starts_with("custom-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
