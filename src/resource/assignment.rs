use super::Resource;
use crate::core::{DbError, Result, Value};
use crate::repository::Record;

impl Resource {
    /// Routes each pair through the model's setter named after it (a
    /// trailing `?` is ignored).
    ///
    /// All names are checked before anything is assigned, so an unknown
    /// setter leaves the resource untouched.
    pub fn assign_attributes<I, K, V>(&self, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let model = self.model().clone();
        let mut assignments = Vec::new();

        for (name, value) in attributes {
            let name = name.as_ref();
            let name = name.strip_suffix('?').unwrap_or(name);
            let setter = model.setter(name).ok_or_else(|| DbError::Naming {
                model: model.name().to_string(),
                setter: name.to_string(),
            })?;
            assignments.push((setter, value.into()));
        }

        for (setter, value) in assignments {
            setter(self, value)?;
        }
        Ok(())
    }

    /// Publicly readable attributes, loading lazy ones as needed.
    pub async fn attributes(&self) -> Result<Record> {
        let properties = self.properties()?;
        let mut record = Record::new();
        for property in properties.readable() {
            let value = self.attribute_get(property.name()).await?;
            record.insert(property.name().to_string(), value);
        }
        Ok(record)
    }
}
