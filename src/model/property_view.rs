use std::collections::HashMap;
use std::sync::Arc;

use super::{Property, Visibility};

/// Read-only, declaration-ordered view over a model's properties in one
/// repository.
#[derive(Debug, Clone)]
pub struct PropertyView {
    repository: String,
    properties: Vec<Arc<Property>>,
    index: HashMap<String, usize>,
}

impl PropertyView {
    pub fn new(repository: impl Into<String>, properties: Vec<Property>) -> Self {
        let properties: Vec<Arc<Property>> = properties.into_iter().map(Arc::new).collect();
        let index = properties
            .iter()
            .enumerate()
            .map(|(idx, property)| (property.name().to_string(), idx))
            .collect();
        Self {
            repository: repository.into(),
            properties,
            index,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Property>> {
        self.index.get(name).map(|idx| &self.properties[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.properties.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.name())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn key(&self) -> Vec<Arc<Property>> {
        self.properties
            .iter()
            .filter(|property| property.is_key())
            .cloned()
            .collect()
    }

    pub fn has_serial_key(&self) -> bool {
        self.properties.iter().any(|property| property.is_serial())
    }

    /// Properties fetched by a plain query: everything not declared lazy.
    pub fn defaults(&self) -> Vec<Arc<Property>> {
        self.properties
            .iter()
            .filter(|property| !property.is_lazy())
            .cloned()
            .collect()
    }

    pub fn readable(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.properties
            .iter()
            .filter(|property| property.reader_visibility() == Visibility::Public)
    }

    /// Properties loaded together with `name`.
    ///
    /// A lazy property brings along every lazy property sharing one of its
    /// contexts, or only itself when it has none. A non-lazy property brings
    /// the default (non-lazy) set.
    pub fn lazy_load_context(&self, name: &str) -> Vec<Arc<Property>> {
        let Some(property) = self.get(name) else {
            return Vec::new();
        };

        if !property.is_lazy() {
            return self.defaults();
        }

        if property.lazy_contexts().is_empty() {
            return vec![property.clone()];
        }

        self.properties
            .iter()
            .filter(|candidate| {
                candidate.is_lazy()
                    && candidate
                        .lazy_contexts()
                        .iter()
                        .any(|context| property.lazy_contexts().contains(context))
            })
            .cloned()
            .collect()
    }
}
