use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::{Changes, Condition, IdentityMap, Query, Record, Repository};
use crate::core::{Result, Value};
use crate::resource::Resource;

/// Operation observed by an [`InMemoryRepository`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryCall {
    Create {
        model: String,
        batch: usize,
    },
    Read {
        model: String,
        conditions: Vec<Condition>,
        fields: Vec<String>,
    },
    Update {
        model: String,
        changes: Record,
        conditions: Vec<Condition>,
    },
    Delete {
        model: String,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Record>,
    serial: i64,
}

/// Repository keeping rows in memory.
///
/// Rows are grouped per storage name. Inserting a row whose key already exists
/// is skipped and not counted, so callers observe it as zero affected rows.
pub struct InMemoryRepository {
    name: String,
    tables: RwLock<HashMap<String, Table>>,
    identity_maps: Mutex<HashMap<String, IdentityMap>>,
    calls: Mutex<Vec<RepositoryCall>>,
}

impl InMemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            identity_maps: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Seeds a row directly, bypassing resources.
    pub async fn insert_row(&self, storage_name: &str, record: Record) {
        let mut tables = self.tables.write().await;
        let table = tables.entry(storage_name.to_string()).or_default();
        if let Some(id) = record.get("id").and_then(Value::as_i64) {
            table.serial = table.serial.max(id);
        }
        table.rows.push(record);
    }

    pub async fn rows(&self, storage_name: &str) -> Vec<Record> {
        let tables = self.tables.read().await;
        tables
            .get(storage_name)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Result<Vec<RepositoryCall>> {
        Ok(self.calls.lock()?.clone())
    }

    pub fn clear_calls(&self) -> Result<()> {
        self.calls.lock()?.clear();
        Ok(())
    }

    fn record_call(&self, call: RepositoryCall) -> Result<()> {
        self.calls.lock()?.push(call);
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, batch: &[Resource]) -> Result<usize> {
        let Some(first) = batch.first() else {
            return Ok(0);
        };
        self.record_call(RepositoryCall::Create {
            model: first.model().name().to_string(),
            batch: batch.len(),
        })?;

        let mut tables = self.tables.write().await;
        let mut created = 0;

        for resource in batch {
            let model = resource.model();
            let properties = model.properties(&self.name);
            let table = tables.entry(model.storage_name().to_string()).or_default();

            for property in properties.iter().filter(|property| property.is_serial()) {
                match resource.attribute_get_loaded(property.name())? {
                    Some(Value::Null) | None => {
                        table.serial += 1;
                        property.set(resource, Value::Integer(table.serial))?;
                    }
                    Some(value) => {
                        if let Some(id) = value.as_i64() {
                            table.serial = table.serial.max(id);
                        }
                    }
                }
            }

            let record = resource.loaded_attributes()?;
            let key: Vec<(String, Value)> = properties
                .key()
                .iter()
                .map(|property| {
                    let value = record.get(property.name()).cloned().unwrap_or(Value::Null);
                    (property.name().to_string(), value)
                })
                .collect();
            let duplicate = table.rows.iter().any(|row| {
                key.iter()
                    .all(|(name, value)| row.get(name).is_some_and(|stored| stored == value))
            });
            if duplicate {
                trace!(model = model.name(), "skipping insert of duplicate key");
                continue;
            }

            table.rows.push(record);
            created += 1;
        }

        Ok(created)
    }

    async fn read(&self, query: &Query) -> Result<Vec<Record>> {
        self.record_call(RepositoryCall::Read {
            model: query.model.clone(),
            conditions: query.conditions.clone(),
            fields: query.fields.clone(),
        })?;

        let tables = self.tables.read().await;
        Ok(tables
            .get(&query.storage_name)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|row| query.matches(row))
                    .map(|row| query.project(row))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, changes: &Changes, query: &Query) -> Result<usize> {
        self.record_call(RepositoryCall::Update {
            model: query.model.clone(),
            changes: changes
                .iter()
                .map(|(property, value)| (property.name().to_string(), value.clone()))
                .collect(),
            conditions: query.conditions.clone(),
        })?;

        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&query.storage_name) else {
            return Ok(0);
        };

        let mut affected = 0;
        for row in table.rows.iter_mut().filter(|row| query.matches(row)) {
            for (property, value) in changes {
                row.insert(property.name().to_string(), value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, query: &Query) -> Result<bool> {
        self.record_call(RepositoryCall::Delete {
            model: query.model.clone(),
            conditions: query.conditions.clone(),
        })?;

        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&query.storage_name) else {
            return Ok(false);
        };

        let before = table.rows.len();
        table.rows.retain(|row| !query.matches(row));
        Ok(table.rows.len() < before)
    }

    fn identity_map(&self, model: &str) -> Result<IdentityMap> {
        let mut maps = self.identity_maps.lock()?;
        Ok(maps
            .entry(model.to_string())
            .or_insert_with(|| IdentityMap::new(model))
            .clone())
    }
}
