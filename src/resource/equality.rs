// ============================================================================
// Equality and default ordering
// ============================================================================
//
// `eql` is tiered: same instance, then same model, then (both clean) same
// repository and key, and only then a full attribute comparison. `Hash`
// covers the model and the normalized current key, which `eql` instances
// always share; changing a key therefore changes the hash.
//
// ============================================================================

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::PoisonError;

use super::{Resource, ResourceState, identity};
use crate::core::{DbError, Result, Value};
use crate::model::OrderBy;

impl Resource {
    pub async fn eql(&self, other: &Resource) -> Result<bool> {
        if self.ptr_eq(other) {
            return Ok(true);
        }
        if self.model().name() != other.model().name() {
            return Ok(false);
        }

        if !self.is_dirty()? && !other.is_dirty()? {
            let same_repository = self.repository()?.name() == other.repository()?.name();
            if same_repository && self.key()? == other.key()? {
                return Ok(true);
            }
        }

        let properties = self.properties()?;
        for property in properties.iter() {
            let mine = property.typecast(&self.attribute_get(property.name()).await?);
            let theirs = property.typecast(&other.attribute_get(property.name()).await?);
            if mine != theirs {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Hash of the model name and current key, as used by `Hash`.
    pub fn key_hash(&self) -> Result<u64> {
        let state = self.read_state()?;
        let mut hasher = DefaultHasher::new();
        self.hash_key_in(&state, &mut hasher);
        Ok(hasher.finish())
    }

    fn hash_key_in<H: Hasher>(&self, state: &ResourceState, hasher: &mut H) {
        self.model().name().hash(hasher);
        let properties = self.properties_in(state);
        identity::current_key(&properties.key(), &state.attributes).hash(hasher);
    }

    /// Compares along the model's default order, fetching attributes only
    /// until the first difference.
    pub async fn cmp_by_default_order(&self, other: &Resource) -> Result<Ordering> {
        if self.model().name() != other.model().name() {
            return Err(DbError::TypeMismatch(format!(
                "Cannot compare '{}' with '{}'",
                self.model().name(),
                other.model().name()
            )));
        }

        for order in self.default_order()? {
            let mine = self.attribute_get(&order.property).await?;
            let theirs = other.attribute_get(&order.property).await?;
            let ordering = order.direction.apply(mine.compare(&theirs)?);
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    fn default_order(&self) -> Result<Vec<OrderBy>> {
        Ok(self.model().default_order(self.repository()?.name()))
    }
}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let guard = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.hash_key_in(&guard, state);
    }
}

/// Stable sort along the first resource's default order.
///
/// Every ordered attribute is fetched up front, so lazy attributes are
/// loaded before comparing. Resources of different models, or values that
/// cannot be compared, yield `TypeMismatch`.
pub async fn sort_by_default_order(resources: &mut [Resource]) -> Result<()> {
    let Some(first) = resources.first() else {
        return Ok(());
    };
    let model = first.model().name().to_string();
    let order = first.default_order()?;

    let mut keyed: Vec<(Vec<Value>, Resource)> = Vec::with_capacity(resources.len());
    for resource in resources.iter() {
        if resource.model().name() != model {
            return Err(DbError::TypeMismatch(format!(
                "Cannot sort '{}' together with '{}'",
                resource.model().name(),
                model
            )));
        }
        let mut values = Vec::with_capacity(order.len());
        for entry in &order {
            values.push(resource.attribute_get(&entry.property).await?);
        }
        keyed.push((values, resource.clone()));
    }

    let mut failure = None;
    keyed.sort_by(|(left, _), (right, _)| {
        for (entry, (a, b)) in order.iter().zip(left.iter().zip(right)) {
            match a.compare(b) {
                Ok(Ordering::Equal) => continue,
                Ok(ordering) => return entry.direction.apply(ordering),
                Err(err) => {
                    failure.get_or_insert(err);
                    return Ordering::Equal;
                }
            }
        }
        Ordering::Equal
    });

    if let Some(err) = failure {
        return Err(err);
    }

    for (slot, (_, resource)) in resources.iter_mut().zip(keyed) {
        *slot = resource;
    }
    Ok(())
}
