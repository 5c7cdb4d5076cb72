use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::AttributeStore;
use crate::core::Value;
use crate::model::{Property, PropertyView, Track};
use crate::repository::Changes;

static NULL: Value = Value::Null;

/// Whether `current` counts as a change from `original` under the property's
/// tracking policy.
pub fn values_differ(property: &Property, original: &Value, current: &Value) -> bool {
    match property.track_policy() {
        Track::Hash => hash_value(original) != hash_value(current),
        Track::Value => property.typecast(original) != property.typecast(current),
    }
}

fn hash_value(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Read-only view computing which attributes need writing.
pub struct ChangeTracker<'a> {
    properties: &'a PropertyView,
    attributes: &'a AttributeStore,
    new_record: bool,
}

impl<'a> ChangeTracker<'a> {
    pub fn new(properties: &'a PropertyView, attributes: &'a AttributeStore, new_record: bool) -> Self {
        Self {
            properties,
            attributes,
            new_record,
        }
    }

    /// Every changed attribute mapped to its normalized current value.
    ///
    /// A new resource compares each loaded attribute against its original
    /// (`Null` when none is recorded); a persisted one only looks at the
    /// attributes holding an original, plus those overwritten before their
    /// stored value was known.
    pub fn dirty_attributes(&self) -> Changes {
        self.properties
            .iter()
            .filter_map(|property| {
                let name = property.name();
                let current = self.attributes.get(name).unwrap_or(&NULL);
                let original = match (self.attributes.original(name), self.new_record) {
                    (Some(original), _) => original,
                    (None, true) if self.attributes.is_loaded(name) => &NULL,
                    (None, false) if self.attributes.is_original_unknown(name) => {
                        return Some((property.clone(), property.typecast(current)));
                    }
                    (None, _) => return None,
                };
                values_differ(property, original, current)
                    .then(|| (property.clone(), property.typecast(current)))
            })
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.new_record || !self.dirty_attributes().is_empty()
    }

    pub fn is_attribute_dirty(&self, name: &str) -> bool {
        self.new_record
            || self
                .dirty_attributes()
                .keys()
                .any(|property| property.name() == name)
    }
}
