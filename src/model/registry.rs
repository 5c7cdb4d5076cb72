use std::collections::HashMap;
use std::sync::Arc;

use super::Model;
use crate::core::{DbError, Result};

/// Registry of every model defined for a mapper.
///
/// Populated while models are defined, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Model) -> Result<Arc<Model>> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(DbError::Configuration(format!(
                "Model '{}' is already defined",
                name
            )));
        }

        let model = Arc::new(model);
        self.models.insert(name, model.clone());
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::ModelNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn list_models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
