use std::fmt;
use std::sync::Arc;

use super::AttributeStore;
use crate::core::{Key, Value};
use crate::model::Property;
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceState {
    /// Never successfully created, or destroyed since.
    New,
    /// Created and not destroyed.
    Persisted,
}

/// Whether a resource is persisted, and where.
#[derive(Clone)]
pub struct IdentityState {
    state: PersistenceState,
    binding: Option<Arc<dyn Repository>>,
    readonly: bool,
}

impl IdentityState {
    pub fn new() -> Self {
        Self {
            state: PersistenceState::New,
            binding: None,
            readonly: false,
        }
    }

    pub fn persisted_in(repository: Arc<dyn Repository>) -> Self {
        Self {
            state: PersistenceState::Persisted,
            binding: Some(repository),
            readonly: false,
        }
    }

    pub fn state(&self) -> PersistenceState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == PersistenceState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == PersistenceState::Persisted
    }

    /// The first successful create fixes the binding for good.
    pub fn mark_persisted(&mut self, repository: Arc<dyn Repository>) {
        if self.binding.is_none() {
            self.binding = Some(repository);
        }
        self.state = PersistenceState::Persisted;
    }

    pub fn mark_new(&mut self) {
        self.state = PersistenceState::New;
    }

    pub fn binding(&self) -> Option<&Arc<dyn Repository>> {
        self.binding.as_ref()
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }
}

impl Default for IdentityState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityState")
            .field("state", &self.state)
            .field("binding", &self.binding.as_ref().map(|repository| repository.name()))
            .field("readonly", &self.readonly)
            .finish()
    }
}

/// Key the store knows the resource by: a recorded original beats the
/// current value, so a changed key still addresses the stored row. A `Null`
/// original (left by a destroy) does not count.
pub fn persisted_key(key: &[Arc<Property>], attributes: &AttributeStore) -> Key {
    key.iter()
        .map(|property| {
            attributes
                .original(property.name())
                .filter(|original| !original.is_null())
                .or_else(|| attributes.get(property.name()))
                .cloned()
                .unwrap_or(Value::Null)
        })
        .collect()
}

/// Normalized current key values, `Null` where unloaded.
pub fn current_key(key: &[Arc<Property>], attributes: &AttributeStore) -> Key {
    key.iter()
        .map(|property| {
            attributes
                .get(property.name())
                .map(|value| property.typecast(value))
                .unwrap_or(Value::Null)
        })
        .collect()
}
