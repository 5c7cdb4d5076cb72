pub mod order;
pub mod property;
pub mod property_view;
pub mod registry;

pub use order::{Direction, OrderBy};
pub use property::{DefaultProvider, Property, PropertyDefault, Track, Visibility};
pub use property_view::PropertyView;
pub use registry::ModelRegistry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{DbError, Result, Value};
use crate::resource::Resource;

pub const DEFAULT_REPOSITORY: &str = "default";

/// Setter invoked by mass assignment.
pub type Setter = Arc<dyn Fn(&Resource, Value) -> Result<()> + Send + Sync>;

/// Type-level description of one mapped entity type.
pub struct Model {
    name: String,
    storage_name: String,
    default_repository: String,
    properties: HashMap<String, Arc<PropertyView>>,
    relationships: HashMap<String, Vec<String>>,
    default_order: Vec<OrderBy>,
    setters: HashMap<String, Setter>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Name of the repository resources of this model live in by default.
    pub fn repository(&self) -> &str {
        &self.default_repository
    }

    /// Properties in `repository`, falling back to the default repository's
    /// declarations.
    pub fn properties(&self, repository: &str) -> Arc<PropertyView> {
        self.properties
            .get(repository)
            .or_else(|| self.properties.get(&self.default_repository))
            .cloned()
            .unwrap_or_else(|| Arc::new(PropertyView::new(repository, Vec::new())))
    }

    pub fn key(&self, repository: &str) -> Vec<Arc<Property>> {
        self.properties(repository).key()
    }

    pub fn relationships(&self, repository: &str) -> &[String] {
        self.relationships
            .get(repository)
            .or_else(|| self.relationships.get(&self.default_repository))
            .map(|names| names.as_slice())
            .unwrap_or(&[])
    }

    /// Declared default order, or the key ascending when none was declared.
    pub fn default_order(&self, repository: &str) -> Vec<OrderBy> {
        if !self.default_order.is_empty() {
            return self.default_order.clone();
        }
        self.key(repository)
            .iter()
            .map(|property| OrderBy::asc(property.name()))
            .collect()
    }

    pub fn setter(&self, name: &str) -> Option<&Setter> {
        self.setters.get(name)
    }

    pub fn has_setter(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut setters: Vec<&String> = self.setters.keys().collect();
        setters.sort();
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("storage_name", &self.storage_name)
            .field("default_repository", &self.default_repository)
            .field("properties", &self.properties)
            .field("relationships", &self.relationships)
            .field("default_order", &self.default_order)
            .field("setters", &setters)
            .finish()
    }
}

/// Builder for [`Model`].
///
/// # Examples
///
/// ```
/// use rustmemorm::{DataType, ModelBuilder, OrderBy, Property};
///
/// let person = ModelBuilder::new("Person")
///     .property(Property::serial("id"))
///     .property(Property::new("name", DataType::Text))
///     .order(OrderBy::asc("name"))
///     .build()
///     .unwrap();
///
/// assert_eq!(person.storage_name(), "people");
/// assert!(person.has_setter("name"));
/// ```
pub struct ModelBuilder {
    name: String,
    storage_name: Option<String>,
    default_repository: Option<String>,
    properties: Vec<(Option<String>, Property)>,
    relationships: Vec<(Option<String>, String)>,
    default_order: Vec<OrderBy>,
    setters: Vec<(String, Setter)>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            default_repository: None,
            properties: Vec::new(),
            relationships: Vec::new(),
            default_order: Vec::new(),
            setters: Vec::new(),
        }
    }

    pub fn storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.default_repository = Some(repository.into());
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push((None, property));
        self
    }

    /// Declares a property that only exists in `repository`.
    pub fn property_in(mut self, repository: impl Into<String>, property: Property) -> Self {
        self.properties.push((Some(repository.into()), property));
        self
    }

    pub fn relationship(mut self, name: impl Into<String>) -> Self {
        self.relationships.push((None, name.into()));
        self
    }

    pub fn relationship_in(mut self, repository: impl Into<String>, name: impl Into<String>) -> Self {
        self.relationships.push((Some(repository.into()), name.into()));
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.default_order.push(order);
        self
    }

    /// Registers a custom mass-assignment setter.
    pub fn setter<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&Resource, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.setters.push((name.into(), Arc::new(setter)));
        self
    }

    pub fn build(self) -> Result<Model> {
        self.build_in(DEFAULT_REPOSITORY)
    }

    /// Builds the model, using `fallback_repository` when no repository was
    /// named explicitly.
    pub fn build_in(self, fallback_repository: &str) -> Result<Model> {
        let default_repository = self
            .default_repository
            .unwrap_or_else(|| fallback_repository.to_string());
        let storage_name = self
            .storage_name
            .unwrap_or_else(|| default_storage_name(&self.name));

        // Default declarations are inherited by every named repository.
        let mut declared: HashMap<String, Vec<Property>> = HashMap::new();
        let mut shared = Vec::new();
        for (repository, property) in self.properties {
            match repository {
                Some(repository) => declared.entry(repository).or_default().push(property),
                None => shared.push(property),
            }
        }
        declared.entry(default_repository.clone()).or_default();

        let mut relationships: HashMap<String, Vec<String>> = HashMap::new();
        let mut shared_relationships = Vec::new();
        for (repository, name) in self.relationships {
            match repository {
                Some(repository) => {
                    declared.entry(repository.clone()).or_default();
                    relationships.entry(repository).or_default().push(name)
                }
                None => shared_relationships.push(name),
            }
        }

        let mut properties = HashMap::new();
        for (repository, extra) in declared {
            let mut merged = shared.clone();
            for property in extra {
                if merged.iter().any(|existing| existing.name() == property.name()) {
                    return Err(DbError::Configuration(format!(
                        "Property '{}' declared twice on model '{}'",
                        property.name(),
                        self.name
                    )));
                }
                merged.push(property);
            }

            let mut repo_relationships = shared_relationships.clone();
            repo_relationships.extend(relationships.remove(&repository).unwrap_or_default());

            let view = PropertyView::new(repository.clone(), merged);
            validate_shape(&self.name, &repository, &view, &repo_relationships)?;
            properties.insert(repository.clone(), Arc::new(view));
            relationships.insert(repository, repo_relationships);
        }

        let default_view = properties
            .get(&default_repository)
            .cloned()
            .ok_or_else(|| DbError::Configuration(format!("Model '{}' has no properties", self.name)))?;

        for order in &self.default_order {
            if !default_view.contains(&order.property) {
                return Err(DbError::Configuration(format!(
                    "Default order of model '{}' references unknown property '{}'",
                    self.name, order.property
                )));
            }
        }

        let mut setters: HashMap<String, Setter> = HashMap::new();
        for property in default_view.iter() {
            if property.writer_visibility() != Visibility::Public {
                continue;
            }
            let attribute = property.name().to_string();
            setters.insert(
                property.setter().to_string(),
                Arc::new(move |resource: &Resource, value: Value| {
                    resource.attribute_set(&attribute, value)
                }),
            );
        }
        for (name, setter) in self.setters {
            setters.insert(name, setter);
        }

        Ok(Model {
            name: self.name,
            storage_name,
            default_repository,
            properties,
            relationships,
            default_order: self.default_order,
            setters,
        })
    }
}

fn validate_shape(
    model: &str,
    repository: &str,
    view: &PropertyView,
    relationships: &[String],
) -> Result<()> {
    if view.is_empty() && relationships.is_empty() {
        return Err(DbError::Configuration(format!(
            "Model '{}' has no properties or relationships in repository '{}'",
            model, repository
        )));
    }
    if view.key().is_empty() {
        return Err(DbError::Configuration(format!(
            "Model '{}' has no key in repository '{}'",
            model, repository
        )));
    }
    Ok(())
}

/// `Person` -> `people`, `BlogPost` -> `blog_posts`.
fn default_storage_name(model: &str) -> String {
    let mut snake = String::with_capacity(model.len() + 4);
    for (idx, ch) in model.chars().enumerate() {
        if ch.is_uppercase() {
            if idx > 0 {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(ch);
        }
    }

    if let Some(stem) = snake.strip_suffix("person") {
        return format!("{}people", stem);
    }
    if snake.ends_with('s') || snake.ends_with('x') || snake.ends_with("sh") || snake.ends_with("ch") {
        return format!("{}es", snake);
    }
    if let Some(stem) = snake.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", snake)
}
