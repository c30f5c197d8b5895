//! Dynamically typed values passed through communications.
//!
//! Callers and callees agree on argument *names* and *type tags*, never on
//! parameter order or concrete host types. A [`Value`] carries its own tag so
//! a handler can check what it received before touching it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{CommunicationError, Result};

/// A single dynamically typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Binary(Vec<u8>),
    Null,
}

impl Value {
    /// The runtime type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Boolean(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::Null => ValueType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

/// Runtime type tag for values and declared parameters.
///
/// All integer widths collapse into one `Integer` tag, so a plain integer
/// argument always satisfies a parameter declared as an integer; there is no
/// boxed/primitive distinction at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
    Binary,
    Null,
}

impl ValueType {
    /// Whether a value with this declared tag accepts `value`.
    pub fn accepts(&self, value: &Value) -> bool {
        *self == value.value_type()
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Binary => "binary",
            ValueType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Named argument collection for function invocations.
///
/// Arguments are keyed by name so callers and callees never have to agree on
/// parameter order. The typed accessors surface an argument-type error naming
/// the expected and actual tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments(HashMap<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get an argument that must be present.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.0
            .get(name)
            .ok_or_else(|| CommunicationError::MissingArgument(name.to_string()))
    }

    pub fn get_integer(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            Value::Integer(v) => Ok(*v),
            other => Err(self.type_error(name, ValueType::Integer, other)),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            other => Err(self.type_error(name, ValueType::Float, other)),
        }
    }

    pub fn get_boolean(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            Value::Boolean(v) => Ok(*v),
            other => Err(self.type_error(name, ValueType::Boolean, other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            Value::String(v) => Ok(v.as_str()),
            other => Err(self.type_error(name, ValueType::String, other)),
        }
    }

    pub fn get_binary(&self, name: &str) -> Result<&[u8]> {
        match self.require(name)? {
            Value::Binary(v) => Ok(v.as_slice()),
            other => Err(self.type_error(name, ValueType::Binary, other)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn type_error(&self, name: &str, expected: ValueType, actual: &Value) -> CommunicationError {
        CommunicationError::ArgumentType {
            name: name.to_string(),
            expected,
            actual: actual.value_type(),
        }
    }
}

impl FromIterator<(String, Value)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build an [`Arguments`] map in place.
///
/// ```
/// use modlink_core::args;
///
/// let args = args! { "device" => "sensor-1", "count" => 3 };
/// assert_eq!(args.get_str("device").unwrap(), "sensor-1");
/// ```
#[macro_export]
macro_rules! args {
    () => { $crate::communication::Arguments::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut args = $crate::communication::Arguments::new();
        $(args.insert($name, $value);)+
        args
    }};
}
