// ============================================================================
// RustMemORM Library
// ============================================================================
//
// Resource lifecycle core of a data mapper: attribute storage with dirty
// tracking, persistence state, create/update/destroy/reload coordination
// against a pluggable async repository, identity maps, and value equality
// and ordering of mapped resources.
//
// ============================================================================

pub mod association;
pub mod config;
pub mod core;
pub mod mapper;
pub mod model;
pub mod prelude;
pub mod repository;
pub mod resource;

pub use association::Association;
pub use config::MapperConfig;
pub use core::{DataType, DbError, Key, Result, Value};
pub use mapper::Mapper;
pub use model::{
    Direction, Model, ModelBuilder, ModelRegistry, OrderBy, Property, PropertyView, Track,
    Visibility,
};
pub use repository::{
    Changes, Condition, IdentityMap, InMemoryRepository, Query, Record, Repository,
    RepositoryCall,
};
pub use resource::{PersistenceState, Resource, sort_by_default_order};
