use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbError, Result, Value};

/// Ordered tuple of key attribute values identifying one row.
pub type Key = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Uuid,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Integer, Value::Integer(_))
                | (Self::Float, Value::Float(_))
                | (Self::Float, Value::Integer(_))
                | (Self::Text, Value::Text(_))
                | (Self::Boolean, Value::Boolean(_))
                | (Self::Timestamp, Value::Timestamp(_))
                | (Self::Uuid, Value::Uuid(_))
        )
    }

    /// Normalizes `value` into this type's canonical representation.
    ///
    /// Equivalent representations (`"42"` and `42` for an integer, `"t"` and
    /// `true` for a boolean) collapse to the same `Value`. Values that cannot
    /// be coerced are returned unchanged.
    pub fn typecast(&self, value: &Value) -> Value {
        self.try_typecast(value).unwrap_or_else(|_| value.clone())
    }

    /// Strict variant of [`DataType::typecast`].
    pub fn try_typecast(&self, value: &Value) -> Result<Value> {
        if value.is_null() || (self.is_compatible(value) && !self.needs_widening(value)) {
            return Ok(value.clone());
        }

        let cast = match (self, value) {
            (Self::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            (Self::Integer, Value::Float(f)) if f.is_finite() => {
                Some(Value::Integer(f.trunc() as i64))
            }
            (Self::Integer, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Self::Integer, Value::Boolean(b)) => Some(Value::Integer(i64::from(*b))),
            (Self::Float, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Self::Text, other) => Some(Value::Text(match other {
                Value::Text(s) => s.clone(),
                Value::Timestamp(ts) => ts.to_rfc3339(),
                Value::Uuid(id) => id.to_string(),
                other => other.to_string(),
            })),
            (Self::Boolean, Value::Text(s)) => parse_boolean(s).map(Value::Boolean),
            (Self::Boolean, Value::Integer(i)) => match i {
                0 => Some(Value::Boolean(false)),
                1 => Some(Value::Boolean(true)),
                _ => None,
            },
            (Self::Timestamp, Value::Text(s)) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc))),
            (Self::Timestamp, Value::Integer(secs)) => {
                DateTime::<Utc>::from_timestamp(*secs, 0).map(Value::Timestamp)
            }
            (Self::Uuid, Value::Text(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
            _ => None,
        };

        cast.ok_or_else(|| {
            DbError::TypeMismatch(format!(
                "Cannot cast {} value {} to {}",
                value.type_name(),
                value,
                self
            ))
        })
    }

    fn needs_widening(&self, value: &Value) -> bool {
        matches!((self, value), (Self::Float, Value::Integer(_)))
    }
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Uuid => write!(f, "UUID"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        let int_type = DataType::Integer;
        assert!(int_type.is_compatible(&Value::Integer(42)));
        assert!(int_type.is_compatible(&Value::Null));
        assert!(!int_type.is_compatible(&Value::Text("hello".into())));
    }

    #[test]
    fn test_numeric_string_normalizes_to_integer() {
        assert_eq!(
            DataType::Integer.typecast(&Value::Text(" 42 ".into())),
            Value::Integer(42)
        );
        assert_eq!(
            DataType::Float.typecast(&Value::Integer(3)),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_boolean_aliases() {
        assert_eq!(
            DataType::Boolean.typecast(&Value::Text("t".into())),
            Value::Boolean(true)
        );
        assert_eq!(
            DataType::Boolean.typecast(&Value::Integer(0)),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_uncoercible_value_is_left_alone() {
        let raw = Value::Text("forty-two".into());
        assert_eq!(DataType::Integer.typecast(&raw), raw);
        assert!(DataType::Integer.try_typecast(&raw).is_err());
    }

    #[test]
    fn test_uuid_and_timestamp_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(
            DataType::Uuid.typecast(&Value::Text(id.to_string())),
            Value::Uuid(id)
        );
        assert!(matches!(
            DataType::Timestamp.typecast(&Value::Text("2024-01-02T03:04:05Z".into())),
            Value::Timestamp(_)
        ));
    }
}
