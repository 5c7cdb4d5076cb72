use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{DataType, Result, Value};
use crate::resource::Resource;

/// Access level of a property's reader or writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// How the change tracker decides whether an attribute is dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Track {
    /// Compare normalized values.
    Value,
    /// Compare hashes; for large or opaque values.
    Hash,
}

pub type DefaultProvider = Arc<dyn Fn(&Resource, &Property) -> Value + Send + Sync>;

#[derive(Clone)]
pub enum PropertyDefault {
    None,
    Value(Value),
    Provider(DefaultProvider),
}

impl fmt::Debug for PropertyDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => write!(f, "Provider(..)"),
        }
    }
}

/// Descriptor of one mapped attribute.
///
/// Identity is the property name: two descriptors with the same name compare
/// and hash equal, which lets them key change sets.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    data_type: DataType,
    default: PropertyDefault,
    lazy: bool,
    lazy_contexts: Vec<String>,
    track: Track,
    key: bool,
    serial: bool,
    reader_visibility: Visibility,
    writer_visibility: Visibility,
    getter: String,
    setter: String,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        let getter = match data_type {
            DataType::Boolean => format!("{}?", name),
            _ => name.clone(),
        };
        Self {
            setter: name.clone(),
            getter,
            name,
            data_type,
            default: PropertyDefault::None,
            lazy: false,
            lazy_contexts: Vec::new(),
            track: Track::Value,
            key: false,
            serial: false,
            reader_visibility: Visibility::Public,
            writer_visibility: Visibility::Public,
        }
    }

    /// Serial integer key generated by the store.
    pub fn serial(name: impl Into<String>) -> Self {
        let mut property = Self::new(name, DataType::Integer);
        property.key = true;
        property.serial = true;
        property
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = PropertyDefault::Value(value.into());
        self
    }

    pub fn default_with<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Resource, &Property) -> Value + Send + Sync + 'static,
    {
        self.default = PropertyDefault::Provider(Arc::new(provider));
        self
    }

    /// Lazy property loaded on its own.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Lazy property loaded together with every other property of `context`.
    pub fn lazy_in(mut self, context: impl Into<String>) -> Self {
        self.lazy = true;
        self.lazy_contexts.push(context.into());
        self
    }

    pub fn track(mut self, track: Track) -> Self {
        self.track = track;
        self
    }

    pub fn reader(mut self, visibility: Visibility) -> Self {
        self.reader_visibility = visibility;
        self
    }

    pub fn writer(mut self, visibility: Visibility) -> Self {
        self.writer_visibility = visibility;
        self
    }

    pub fn setter_name(mut self, setter: impl Into<String>) -> Self {
        self.setter = setter.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn track_policy(&self) -> Track {
        self.track
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn is_serial(&self) -> bool {
        self.serial
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn lazy_contexts(&self) -> &[String] {
        &self.lazy_contexts
    }

    pub fn getter(&self) -> &str {
        &self.getter
    }

    pub fn setter(&self) -> &str {
        &self.setter
    }

    pub fn reader_visibility(&self) -> Visibility {
        self.reader_visibility
    }

    pub fn writer_visibility(&self) -> Visibility {
        self.writer_visibility
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.default, PropertyDefault::None)
    }

    /// Value a fresh resource gets for this property when it is created
    /// without one.
    pub fn default_for(&self, resource: &Resource) -> Value {
        match &self.default {
            PropertyDefault::None => Value::Null,
            PropertyDefault::Value(value) => self.typecast(value),
            PropertyDefault::Provider(provider) => self.typecast(&provider(resource, self)),
        }
    }

    pub fn typecast(&self, value: &Value) -> Value {
        self.data_type.typecast(value)
    }

    /// Reads the value, lazily loading it when needed.
    pub async fn get(&self, resource: &Resource) -> Result<Value> {
        resource.attribute_get(&self.name).await
    }

    /// Reads the loaded value without touching the store.
    pub fn get_loaded(&self, resource: &Resource) -> Result<Option<Value>> {
        resource.attribute_get_loaded(&self.name)
    }

    pub fn set(&self, resource: &Resource, value: impl Into<Value>) -> Result<()> {
        resource.attribute_set(&self.name, value)
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Property {}

impl PartialOrd for Property {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Property {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for Property {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
