// ============================================================================
// Resource: one mapped entity instance
// ============================================================================
//
// A `Resource` is a cheap handle; clones share one instance, which is what the
// identity map hands back for a key. The instance state sits behind a std
// `RwLock` that is only ever held for short, synchronous sections and never
// across a repository call.
//
// ============================================================================

mod assignment;
pub mod attributes;
pub mod dirty;
mod equality;
pub mod identity;
mod lifecycle;

pub use attributes::AttributeStore;
pub use dirty::ChangeTracker;
pub use equality::sort_by_default_order;
pub use identity::{IdentityState, PersistenceState};

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::association::{Association, AssociationList};
use crate::config::MapperConfig;
use crate::core::{DbError, Key, Result, Value};
use crate::model::{Model, PropertyView};
use crate::repository::{Changes, Condition, Query, Record, Repository};

pub(crate) struct ResourceState {
    attributes: AttributeStore,
    identity: IdentityState,
    parents: AssociationList,
    children: AssociationList,
}

struct ResourceInner {
    model: Arc<Model>,
    /// Repository the resource lives in until a create binds it.
    context: Arc<dyn Repository>,
    config: Arc<MapperConfig>,
    state: RwLock<ResourceState>,
    saving: AtomicBool,
    reloading: AtomicBool,
}

#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

/// Non-owning handle, as kept by identity maps.
#[derive(Clone)]
pub struct WeakResource(Weak<ResourceInner>);

impl WeakResource {
    pub fn upgrade(&self) -> Option<Resource> {
        self.0.upgrade().map(|inner| Resource { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Resource {
    /// Fresh, unsaved resource of `model` living in `repository`.
    pub fn new(
        model: Arc<Model>,
        repository: Arc<dyn Repository>,
        config: Arc<MapperConfig>,
    ) -> Result<Self> {
        Self::with_identity(model, repository, config, IdentityState::new())
    }

    /// Persisted resource materialized from a stored row.
    pub fn from_record(
        model: Arc<Model>,
        repository: Arc<dyn Repository>,
        config: Arc<MapperConfig>,
        record: Record,
    ) -> Result<Self> {
        let identity = IdentityState::persisted_in(repository.clone());
        let resource = Self::with_identity(model, repository, config, identity)?;
        let properties = resource.properties()?;
        let record: Record = record
            .into_iter()
            .filter_map(|(name, value)| {
                let property = properties.get(&name)?;
                Some((name, property.typecast(&value)))
            })
            .collect();
        resource.write_state()?.attributes.load(record);
        Ok(resource)
    }

    fn with_identity(
        model: Arc<Model>,
        repository: Arc<dyn Repository>,
        config: Arc<MapperConfig>,
        identity: IdentityState,
    ) -> Result<Self> {
        let properties = model.properties(repository.name());
        if properties.is_empty() && model.relationships(repository.name()).is_empty() {
            return Err(DbError::Configuration(format!(
                "Model '{}' has no properties or relationships",
                model.name()
            )));
        }
        if properties.key().is_empty() {
            return Err(DbError::Configuration(format!(
                "Model '{}' has no key in repository '{}'",
                model.name(),
                repository.name()
            )));
        }

        Ok(Self {
            inner: Arc::new(ResourceInner {
                model,
                context: repository,
                config,
                state: RwLock::new(ResourceState {
                    attributes: AttributeStore::new(),
                    identity,
                    parents: AssociationList::new(),
                    children: AssociationList::new(),
                }),
                saving: AtomicBool::new(false),
                reloading: AtomicBool::new(false),
            }),
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ResourceState>> {
        Ok(self.inner.state.read()?)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ResourceState>> {
        Ok(self.inner.state.write()?)
    }

    pub fn downgrade(&self) -> WeakResource {
        WeakResource(Arc::downgrade(&self.inner))
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn identity_ptr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.inner.model
    }

    pub fn config(&self) -> &MapperConfig {
        &self.inner.config
    }

    /// The bound repository once persisted, the context repository before.
    pub fn repository(&self) -> Result<Arc<dyn Repository>> {
        Ok(self.repository_in(&*self.read_state()?))
    }

    fn repository_in(&self, state: &ResourceState) -> Arc<dyn Repository> {
        state
            .identity
            .binding()
            .cloned()
            .unwrap_or_else(|| self.inner.context.clone())
    }

    pub fn properties(&self) -> Result<Arc<PropertyView>> {
        Ok(self.inner.model.properties(self.repository()?.name()))
    }

    /// Property view for an already held state guard.
    fn properties_in(&self, state: &ResourceState) -> Arc<PropertyView> {
        self.inner.model.properties(self.repository_in(state).name())
    }

    pub fn persistence_state(&self) -> Result<PersistenceState> {
        Ok(self.read_state()?.identity.state())
    }

    pub fn is_new(&self) -> Result<bool> {
        Ok(self.read_state()?.identity.is_new())
    }

    pub fn is_saved(&self) -> Result<bool> {
        Ok(self.read_state()?.identity.is_persisted())
    }

    pub fn is_readonly(&self) -> Result<bool> {
        Ok(self.read_state()?.identity.is_readonly())
    }

    pub fn set_readonly(&self, readonly: bool) -> Result<()> {
        self.write_state()?.identity.set_readonly(readonly);
        Ok(())
    }

    /// The persisted key, see [`identity::persisted_key`].
    pub fn key(&self) -> Result<Key> {
        let key = self.properties()?.key();
        let state = self.read_state()?;
        Ok(identity::persisted_key(&key, &state.attributes))
    }

    /// Query scoped to exactly this resource's stored row.
    pub fn to_query(&self, extra_conditions: Vec<Condition>) -> Result<Query> {
        let repository = self.repository()?;
        let model = self.model();
        Query::new(repository.name(), model.name(), model.storage_name()).for_key(
            &model.key(repository.name()),
            &self.key()?,
            extra_conditions,
        )
    }

    /// Reads an attribute, lazily loading it (and its lazy-load context)
    /// when the resource is persisted and the value is not materialized yet.
    pub async fn attribute_get(&self, name: &str) -> Result<Value> {
        self.ensure_declared(name)?;
        if let Some(value) = self.attribute_get_loaded(name)? {
            return Ok(value);
        }
        self.lazy_load(name).await?;
        Ok(self.attribute_get_loaded(name)?.unwrap_or(Value::Null))
    }

    /// Loaded value, `None` when never materialized. Never hits the store.
    pub fn attribute_get_loaded(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.read_state()?.attributes.get(name).cloned())
    }

    /// Stores a normalized value. On a persisted resource the value it
    /// replaces is remembered as the original, unless one is already held;
    /// setting an attribute back to its original forgets the original.
    ///
    /// Overwriting an attribute that was never materialized leaves its
    /// stored value unknown, so the write always counts as a change. Use
    /// [`Resource::attribute_write`] to compare against the stored value.
    pub fn attribute_set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let properties = self.properties()?;
        let property = properties
            .get(name)
            .ok_or_else(|| self.unknown_attribute(name))?;
        let value = property.typecast(&value.into());

        let mut state = self.write_state()?;
        if state.identity.is_persisted() && !state.attributes.is_original_unknown(name) {
            match state.attributes.original(name) {
                Some(original) => {
                    if !dirty::values_differ(property, original, &value) {
                        state.attributes.forget_original(name);
                    }
                }
                None if !state.attributes.is_loaded(name) => {
                    state.attributes.mark_original_unknown(name);
                }
                None => {
                    let previous = state.attributes.get(name).cloned().unwrap_or(Value::Null);
                    if dirty::values_differ(property, &previous, &value) {
                        state.attributes.record_original(name, previous);
                    }
                }
            }
        }
        state.attributes.set(name, value);
        Ok(())
    }

    /// `attribute_set` after lazily loading the attribute, so writing back
    /// the stored value leaves the resource clean.
    pub async fn attribute_write(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_declared(name)?;
        self.lazy_load(name).await?;
        self.attribute_set(name, value)
    }

    pub fn attribute_loaded(&self, name: &str) -> Result<bool> {
        Ok(self.read_state()?.attributes.is_loaded(name))
    }

    /// Every materialized attribute, without touching the store.
    pub fn loaded_attributes(&self) -> Result<Record> {
        let state = self.read_state()?;
        Ok(state
            .attributes
            .values()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    pub fn original_attributes(&self) -> Result<Record> {
        let state = self.read_state()?;
        Ok(state
            .attributes
            .originals()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    pub fn dirty_attributes(&self) -> Result<Changes> {
        let properties = self.properties()?;
        let state = self.read_state()?;
        Ok(ChangeTracker::new(&properties, &state.attributes, state.identity.is_new())
            .dirty_attributes())
    }

    pub fn is_dirty(&self) -> Result<bool> {
        let properties = self.properties()?;
        let state = self.read_state()?;
        Ok(ChangeTracker::new(&properties, &state.attributes, state.identity.is_new()).is_dirty())
    }

    pub fn is_attribute_dirty(&self, name: &str) -> Result<bool> {
        self.ensure_declared(name)?;
        let properties = self.properties()?;
        let state = self.read_state()?;
        Ok(ChangeTracker::new(&properties, &state.attributes, state.identity.is_new())
            .is_attribute_dirty(name))
    }

    /// Adds a parent-side association; saves cascade to it first.
    /// Returns false when the same handle is already linked.
    pub fn add_parent(&self, parent: Arc<dyn Association>) -> Result<bool> {
        Ok(self.write_state()?.parents.push(parent))
    }

    pub fn add_child(&self, child: Arc<dyn Association>) -> Result<bool> {
        Ok(self.write_state()?.children.push(child))
    }

    pub fn parents(&self) -> Result<Vec<Arc<dyn Association>>> {
        Ok(self.read_state()?.parents.snapshot())
    }

    pub fn children(&self) -> Result<Vec<Arc<dyn Association>>> {
        Ok(self.read_state()?.children.snapshot())
    }

    fn ensure_declared(&self, name: &str) -> Result<()> {
        if self.properties()?.contains(name) {
            Ok(())
        } else {
            Err(self.unknown_attribute(name))
        }
    }

    fn unknown_attribute(&self, name: &str) -> DbError {
        DbError::UnknownAttribute(name.to_string(), self.model().name().to_string())
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Resource");
        debug.field("model", &self.model().name());

        let Ok(state) = self.inner.state.read() else {
            return debug.field("state", &"<poisoned>").finish();
        };
        debug.field("state", &state.identity.state());
        let properties = self.properties_in(&state);

        let attributes: Vec<String> = properties
            .iter()
            .map(|property| match state.attributes.get(property.name()) {
                Some(value) => format!("{}={}", property.name(), value),
                None => format!("{}=<not loaded>", property.name()),
            })
            .collect();
        debug.field("attributes", &attributes).finish()
    }
}
