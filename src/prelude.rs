//! Everything an application needs to define models and work with
//! resources.
//!
//! ```
//! use rustmemorm::prelude::*;
//!
//! let config = MapperConfig::default().cascade(false);
//! let mapper = Mapper::new(config);
//! assert!(mapper.models().list_models().is_empty());
//! ```

pub use crate::{
    Association, DataType, DbError, Direction, InMemoryRepository, Key, Mapper, MapperConfig,
    ModelBuilder, OrderBy, PersistenceState, Property, Repository, Resource, Result, Track,
    Value, Visibility, sort_by_default_order,
};
