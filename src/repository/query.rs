use std::fmt;
use std::sync::Arc;

use crate::core::{DbError, Key, Result, Value};
use crate::model::Property;

use super::Record;

/// Equality condition on one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub property: String,
    pub value: Value,
}

impl Condition {
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Scope handed to a repository: which model, which rows, which fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub repository: String,
    pub model: String,
    pub storage_name: String,
    pub conditions: Vec<Condition>,
    /// Fields to fetch; empty means all.
    pub fields: Vec<String>,
}

impl Query {
    pub fn new(
        repository: impl Into<String>,
        model: impl Into<String>,
        storage_name: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            model: model.into(),
            storage_name: storage_name.into(),
            conditions: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Query matching exactly the row addressed by `key`, narrowed further by
    /// `extra_conditions`.
    pub fn for_key(
        mut self,
        key_properties: &[Arc<Property>],
        key: &Key,
        extra_conditions: Vec<Condition>,
    ) -> Result<Self> {
        if key_properties.len() != key.len() {
            return Err(DbError::ExecutionError(format!(
                "Key of model '{}' has {} attributes, got {} values",
                self.model,
                key_properties.len(),
                key.len()
            )));
        }

        for (property, value) in key_properties.iter().zip(key) {
            self.conditions.push(Condition::eq(property.name(), value.clone()));
        }
        self.conditions.extend(extra_conditions);
        Ok(self)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| {
            record
                .get(&condition.property)
                .is_some_and(|value| value == &condition.value)
        })
    }

    /// Copies the requested fields out of `record`.
    pub fn project(&self, record: &Record) -> Record {
        if self.fields.is_empty() {
            return record.clone();
        }
        self.fields
            .iter()
            .filter_map(|field| record.get(field).map(|value| (field.clone(), value.clone())))
            .collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        write!(f, "{}.{} [{}]", self.repository, self.storage_name, fields)?;
        if !self.conditions.is_empty() {
            let conditions: Vec<String> = self
                .conditions
                .iter()
                .map(|condition| format!("{} = {}", condition.property, condition.value))
                .collect();
            write!(f, " WHERE {}", conditions.join(" AND "))?;
        }
        Ok(())
    }
}
