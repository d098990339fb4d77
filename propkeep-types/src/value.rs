//! Declared type tags and the tagged values stored in a container.
//!
//! A container stores [`Value`]s under a declared [`ValueType`]. The
//! [`PropertyType`] trait maps Rust types onto that model so a property can
//! be written as `Property<i32>` or `Property<Json<Settings>>`.

use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The statically declared type of a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    String,
    ByteArray,
    IntArray,
    LongArray,
    /// An ordered sequence whose elements all carry the inner tag.
    List(Box<ValueType>),
}

impl ValueType {
    /// Shorthand for `ValueType::List(Box::new(elem))`.
    #[must_use]
    pub fn list_of(elem: ValueType) -> Self {
        Self::List(Box::new(elem))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte => write!(f, "byte"),
            Self::Short => write!(f, "short"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Boolean => write!(f, "boolean"),
            Self::String => write!(f, "string"),
            Self::ByteArray => write!(f, "byte_array"),
            Self::IntArray => write!(f, "int_array"),
            Self::LongArray => write!(f, "long_array"),
            Self::List(elem) => write!(f, "list<{elem}>"),
        }
    }
}

/// A value as held by a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    ByteArray(Vec<u8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    List(Vec<Value>),
}

impl Value {
    /// Returns true if this value can be stored under `ty`.
    ///
    /// An empty list matches every list tag.
    #[must_use]
    pub fn matches(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Self::Byte(_), ValueType::Byte)
            | (Self::Short(_), ValueType::Short)
            | (Self::Int(_), ValueType::Int)
            | (Self::Long(_), ValueType::Long)
            | (Self::Float(_), ValueType::Float)
            | (Self::Double(_), ValueType::Double)
            | (Self::Boolean(_), ValueType::Boolean)
            | (Self::String(_), ValueType::String)
            | (Self::ByteArray(_), ValueType::ByteArray)
            | (Self::IntArray(_), ValueType::IntArray)
            | (Self::LongArray(_), ValueType::LongArray) => true,
            (Self::List(items), ValueType::List(elem)) => items.iter().all(|v| v.matches(elem)),
            _ => false,
        }
    }

    /// Returns false if this value, or any list element, is a NaN or
    /// infinite float.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::Double(d) => d.is_finite(),
            Self::List(items) => items.iter().all(Self::is_finite),
            _ => true,
        }
    }

    /// Names the shape of this value, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::ByteArray(_) => "byte_array",
            Self::IntArray(_) => "int_array",
            Self::LongArray(_) => "long_array",
            Self::List(_) => "list",
        }
    }

    /// Encodes a sequence of property values as a `Value::List`.
    pub fn from_list<T: PropertyType>(items: &[T]) -> crate::Result<Self> {
        items
            .iter()
            .map(PropertyType::to_value)
            .collect::<crate::Result<Vec<_>>>()
            .map(Self::List)
    }

    /// Decodes a `Value::List` into a sequence of property values.
    pub fn into_list<T: PropertyType>(self) -> crate::Result<Vec<T>> {
        match self {
            Self::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(ValueType::list_of(T::value_type()), &other)),
        }
    }
}

fn mismatch(expected: ValueType, found: &Value) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.type_name().to_string(),
    }
}

/// A Rust type that can be persisted as a [`Value`].
pub trait PropertyType: Clone + Send + Sync + 'static {
    /// The tag values of this type are declared with.
    fn value_type() -> ValueType;

    /// Converts to the stored representation.
    fn to_value(&self) -> crate::Result<Value>;

    /// Converts back from the stored representation.
    fn from_value(value: Value) -> crate::Result<Self>;
}

macro_rules! primitive_property_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PropertyType for $ty {
                fn value_type() -> ValueType {
                    ValueType::$variant
                }

                fn to_value(&self) -> crate::Result<Value> {
                    Ok(Value::$variant(self.clone()))
                }

                fn from_value(value: Value) -> crate::Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch(ValueType::$variant, &other)),
                    }
                }
            }
        )*
    };
}

primitive_property_type! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    String => String,
    Vec<u8> => ByteArray,
    Vec<i32> => IntArray,
    Vec<i64> => LongArray,
}

impl PropertyType for Uuid {
    fn value_type() -> ValueType {
        ValueType::String
    }

    fn to_value(&self) -> crate::Result<Value> {
        Ok(Value::String(self.to_string()))
    }

    fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) => Ok(Uuid::parse_str(&s)?),
            other => Err(mismatch(ValueType::String, &other)),
        }
    }
}

/// Stores any serde type as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwraps the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> PropertyType for Json<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn value_type() -> ValueType {
        ValueType::String
    }

    fn to_value(&self) -> crate::Result<Value> {
        Ok(Value::String(serde_json::to_string(&self.0)?))
    }

    fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) => Ok(Json(serde_json::from_str(&s)?)),
            other => Err(mismatch(ValueType::String, &other)),
        }
    }
}
