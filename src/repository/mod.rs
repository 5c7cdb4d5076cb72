// ============================================================================
// Repository contract
// ============================================================================
//
// The single boundary between resources and the backing store. Every call is
// an opaque, possibly asynchronous, operation; the store's own protocol is the
// implementation's concern.
//
// ============================================================================

pub mod identity_map;
pub mod memory;
pub mod query;

pub use identity_map::IdentityMap;
pub use memory::{InMemoryRepository, RepositoryCall};
pub use query::{Condition, Query};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Result, Value};
use crate::model::Property;
use crate::resource::Resource;

/// One stored row: attribute name to value.
pub type Record = BTreeMap<String, Value>;

/// Attributes to write, keyed by their descriptor.
pub type Changes = BTreeMap<Arc<Property>, Value>;

#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts every resource of `batch`, returning the number of rows
    /// written. Store-generated (serial) keys are written back into the
    /// resources.
    async fn create(&self, batch: &[Resource]) -> Result<usize>;

    /// Fetches the rows matching `query`, restricted to `query.fields`.
    async fn read(&self, query: &Query) -> Result<Vec<Record>>;

    /// Applies `changes` to the rows matching `query`, returning the number
    /// of rows affected.
    async fn update(&self, changes: &Changes, query: &Query) -> Result<usize>;

    /// Removes the rows matching `query`, reporting whether any was removed.
    async fn delete(&self, query: &Query) -> Result<bool>;

    fn identity_map(&self, model: &str) -> Result<IdentityMap>;
}
