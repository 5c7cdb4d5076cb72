// ============================================================================
// Mapper: registry of models and repositories
// ============================================================================
//
// Models are defined once at start-up and are read-only afterwards. The
// mapper hands out resources bound to the right repository and consults the
// identity map so one stored row maps to one live resource.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, Level, event, info_span};

use crate::config::MapperConfig;
use crate::core::{DbError, Key, Result, Value};
use crate::model::{Model, ModelBuilder, ModelRegistry};
use crate::repository::{Query, Record, Repository};
use crate::resource::Resource;

/// Entry point tying models, repositories and configuration together.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rustmemorm::{DataType, InMemoryRepository, Mapper, MapperConfig, ModelBuilder, Property};
///
/// # tokio_test::block_on(async {
/// let mut mapper = Mapper::new(MapperConfig::default());
/// mapper.add_repository(Arc::new(InMemoryRepository::new("default")));
/// mapper
///     .define(
///         ModelBuilder::new("Person")
///             .property(Property::serial("id"))
///             .property(Property::new("name", DataType::Text)),
///     )
///     .unwrap();
///
/// let person = mapper.build("Person", [("name", "Ada")]).unwrap();
/// assert!(person.save().await.unwrap());
/// assert!(!person.is_new().unwrap());
/// # });
/// ```
pub struct Mapper {
    config: Arc<MapperConfig>,
    models: ModelRegistry,
    repositories: HashMap<String, Arc<dyn Repository>>,
}

impl Mapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config: Arc::new(config),
            models: ModelRegistry::new(),
            repositories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Registers a repository under its own name, replacing any previous one.
    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) {
        event!(Level::DEBUG, repository = %repository.name(), "repository registered");
        self.repositories
            .insert(repository.name().to_string(), repository);
    }

    pub fn repository(&self, name: &str) -> Result<Arc<dyn Repository>> {
        self.repositories
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::RepositoryNotFound(name.to_string()))
    }

    /// Builds and registers a model. Models without an explicit repository
    /// live in the configured default one.
    pub fn define(&mut self, builder: ModelBuilder) -> Result<Arc<Model>> {
        self.config.validate()?;
        let model = builder.build_in(&self.config.default_repository)?;
        self.models.register(model)
    }

    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.models.get(name)
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Fresh resource in the model's default repository.
    pub fn new_resource(&self, model: &str) -> Result<Resource> {
        let model = self.model(model)?;
        let repository = self.repository(model.repository())?;
        Resource::new(model, repository, self.config.clone())
    }

    pub fn new_resource_in(&self, model: &str, repository: &str) -> Result<Resource> {
        let model = self.model(model)?;
        let repository = self.repository(repository)?;
        Resource::new(model, repository, self.config.clone())
    }

    /// Fresh resource with `attributes` mass-assigned.
    pub fn build<I, K, V>(&self, model: &str, attributes: I) -> Result<Resource>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let resource = self.new_resource(model)?;
        resource.assign_attributes(attributes)?;
        Ok(resource)
    }

    /// Materializes a stored row, returning the live resource for its key
    /// when the identity map already holds one.
    pub fn load(&self, model: &str, record: Record) -> Result<Resource> {
        let model = self.model(model)?;
        let repository = self.repository(model.repository())?;
        let properties = model.properties(repository.name());

        let key: Key = properties
            .key()
            .iter()
            .map(|property| {
                record
                    .get(property.name())
                    .map(|value| property.typecast(value))
                    .unwrap_or(Value::Null)
            })
            .collect();

        if self.config.identity_map {
            let identity_map = repository.identity_map(model.name())?;
            if let Some(existing) = identity_map.get(&key)? {
                return Ok(existing);
            }
            let resource = Resource::from_record(model, repository, self.config.clone(), record)?;
            identity_map.set(key, &resource)?;
            return Ok(resource);
        }

        Resource::from_record(model, repository, self.config.clone(), record)
    }

    /// Live resource for `key`, without touching the store.
    pub fn get(&self, model: &str, key: &Key) -> Result<Option<Resource>> {
        let model = self.model(model)?;
        let repository = self.repository(model.repository())?;
        repository.identity_map(model.name())?.get(key)
    }

    /// Resource for `key`: the live one if any, otherwise read from the
    /// store with the default (non-lazy) attributes.
    pub async fn find(&self, model_name: &str, key: &Key) -> Result<Option<Resource>> {
        if self.config.identity_map {
            if let Some(existing) = self.get(model_name, key)? {
                return Ok(Some(existing));
            }
        }

        let model = self.model(model_name)?;
        let repository = self.repository(model.repository())?;
        let properties = model.properties(repository.name());
        let query = Query::new(repository.name(), model.name(), model.storage_name())
            .for_key(&properties.key(), key, Vec::new())?
            .with_fields(properties.defaults().iter().map(|p| p.name().to_string()));

        let span = info_span!("mapper.find", model = %model_name, key = ?key);
        let rows = repository.read(&query).instrument(span).await?;
        match rows.into_iter().next() {
            Some(record) => self.load(model_name, record).map(Some),
            None => Ok(None),
        }
    }
}
