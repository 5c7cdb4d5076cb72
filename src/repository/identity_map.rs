use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::{Key, Result};
use crate::resource::{Resource, WeakResource};

/// Per-repository, per-model cache from key to the single live resource for
/// that row.
///
/// Entries are weak: the map never keeps a resource alive on its own, and a
/// dropped resource simply stops being found.
#[derive(Clone, Default)]
pub struct IdentityMap {
    model: String,
    entries: Arc<RwLock<HashMap<Key, WeakResource>>>,
}

impl IdentityMap {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn get(&self, key: &Key) -> Result<Option<Resource>> {
        let entries = self.entries.read()?;
        Ok(entries.get(key).and_then(WeakResource::upgrade))
    }

    pub fn set(&self, key: Key, resource: &Resource) -> Result<()> {
        let mut entries = self.entries.write()?;
        entries.retain(|_, entry| entry.is_alive());
        entries.insert(key, resource.downgrade());
        Ok(())
    }

    pub fn delete(&self, key: &Key) -> Result<Option<Resource>> {
        let mut entries = self.entries.write()?;
        Ok(entries.remove(key).and_then(|entry| entry.upgrade()))
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.read()?;
        Ok(entries.values().filter(|entry| entry.is_alive()).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap")
            .field("model", &self.model)
            .field("entries", &self.len().unwrap_or_default())
            .finish()
    }
}
